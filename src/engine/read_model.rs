// ==========================================
// 农场区块生命周期 - 区块读模型派生
// ==========================================
// 读时计算 calculated 字段,不落库
// ==========================================

use crate::domain::block::{Block, BlockCalculated};
use crate::domain::plant::PlantGrowthProfile;
use crate::engine::timeline::TimelineCalculator;
use crate::engine::yield_aggregator::YieldAggregator;
use chrono::NaiveDate;

pub struct BlockReadModel<'a> {
    timeline: &'a TimelineCalculator,
}

impl<'a> BlockReadModel<'a> {
    pub fn new(timeline: &'a TimelineCalculator) -> Self {
        Self { timeline }
    }

    /// 计算 calculated 字段
    pub fn derive(
        &self,
        block: &Block,
        profile: Option<&PlantGrowthProfile>,
        today: NaiveDate,
    ) -> BlockCalculated {
        let metrics = self.timeline.metrics(block, profile, today);
        let efficiency = block.kpi.yield_efficiency_percent;

        BlockCalculated {
            days_in_current_state: metrics.days_in_current_state,
            next_state: metrics.next_state,
            expected_next_date: metrics.expected_next_date,
            days_until_next_transition: metrics.days_until_next_transition,
            is_delayed: metrics.is_delayed,
            delay_days: metrics.delay_days,
            capacity_percent: block.capacity_percent(),
            yield_progress: YieldAggregator::yield_progress(efficiency),
            performance_category: efficiency.map(YieldAggregator::classify),
        }
    }

    /// 填充区块的 calculated 字段
    pub fn enrich(
        &self,
        mut block: Block,
        profile: Option<&PlantGrowthProfile>,
        today: NaiveDate,
    ) -> Block {
        block.calculated = Some(self.derive(&block, profile, today));
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BlockState, PerformanceCategory};

    #[test]
    fn test_enrich_populates_yield_fields() {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut block = Block::new("B1".into(), "F1".into(), "c".into(), "n".into(), 200, created);
        block.state = BlockState::Harvesting;
        block.actual_plant_count = Some(100);
        block.kpi.predicted_yield_kg = 10.0;
        block.kpi.actual_yield_kg = 15.0;
        block.kpi.yield_efficiency_percent = Some(150.0);

        let tl = TimelineCalculator::default();
        let enriched = BlockReadModel::new(&tl).enrich(
            block,
            None,
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
        );
        let calc = enriched.calculated.unwrap();
        assert_eq!(calc.capacity_percent, 50.0);
        assert_eq!(calc.yield_progress, Some(100.0));
        assert_eq!(calc.performance_category, Some(PerformanceCategory::Exceeding));
        assert_eq!(calc.days_in_current_state, 10);
        assert_eq!(calc.next_state, Some(BlockState::Cleaning));
    }
}
