// ==========================================
// 农场区块生命周期 - 产量聚合
// ==========================================
// 规则: 只有 harvesting 状态允许记录采收
// 规则: 效率 = 实际 / 预测 * 100 (预测为 0 时无定义)
// 规则: 分类使用未封顶效率; yield_progress 封顶 100 仅用于进度条
// ==========================================

use crate::domain::block::{Block, BlockKpi};
use crate::domain::types::{BlockState, PerformanceCategory, QualityGrade};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// HarvestRecord - 单次采收
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRecord {
    pub harvested_kg: f64,
    pub grade: QualityGrade,
    pub harvested_at: NaiveDateTime,
}

pub struct YieldAggregator;

impl YieldAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 记录一次采收，返回更新后的区块副本
    ///
    /// # 错误
    /// - `InvalidState`: 区块不在 harvesting
    /// - `ValidationError`: 采收重量不是正数
    pub fn record_harvest(&self, block: &Block, harvest: &HarvestRecord) -> EngineResult<Block> {
        if block.state != BlockState::Harvesting {
            return Err(EngineError::InvalidState {
                state: block.state,
                reason: "只有 harvesting 状态允许记录采收".to_string(),
            });
        }
        if !harvest.harvested_kg.is_finite() || harvest.harvested_kg <= 0.0 {
            return Err(EngineError::ValidationError(format!(
                "采收重量必须大于 0: {}",
                harvest.harvested_kg
            )));
        }

        let mut next = block.clone();
        next.kpi.actual_yield_kg += harvest.harvested_kg;
        next.kpi.total_harvests += 1;
        next.kpi.quality_breakdown.add(harvest.grade, harvest.harvested_kg);
        Self::recompute(&mut next.kpi);
        next.updated_at = harvest.harvested_at.max(block.updated_at);

        Ok(next)
    }

    /// 根据实际/预测产量重算效率
    pub fn recompute(kpi: &mut BlockKpi) {
        kpi.yield_efficiency_percent =
            Self::efficiency_percent(kpi.actual_yield_kg, kpi.predicted_yield_kg);
    }

    pub fn efficiency_percent(actual_kg: f64, predicted_kg: f64) -> Option<f64> {
        if predicted_kg > 0.0 {
            Some(actual_kg / predicted_kg * 100.0)
        } else {
            None
        }
    }

    /// 效率分类
    pub fn classify(efficiency_percent: f64) -> PerformanceCategory {
        match efficiency_percent {
            e if e >= 200.0 => PerformanceCategory::Exceptional,
            e if e >= 100.0 => PerformanceCategory::Exceeding,
            e if e >= 90.0 => PerformanceCategory::Excellent,
            e if e >= 70.0 => PerformanceCategory::Good,
            e if e >= 50.0 => PerformanceCategory::Acceptable,
            _ => PerformanceCategory::Poor,
        }
    }

    pub fn yield_progress(efficiency_percent: Option<f64>) -> Option<f64> {
        efficiency_percent.map(|e| e.min(100.0))
    }
}

impl Default for YieldAggregator {
    fn default() -> Self {
        Self::new()
    }
}
