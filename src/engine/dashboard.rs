// ==========================================
// 农场区块生命周期 - 驾驶舱聚合
// ==========================================
// 纯读组合: 从区块读模型计算农场汇总,不修改任何区块
// 口径: avg_yield_efficiency 只对有定义的效率取平均
// ==========================================

use crate::domain::block::Block;
use crate::domain::types::{AlertSeverity, BlockState};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// FarmingYear - 农业年度窗口
// ==========================================
// 年度 Y = [Y-起始月-01, (Y+1)-起始月-01)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmingYear {
    pub year: i32,
    pub start_month: u32,
}

impl FarmingYear {
    pub fn new(year: i32, start_month: u32) -> Self {
        Self {
            year,
            start_month: start_month.clamp(1, 12),
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.start_month, 1)
    }

    pub fn end_exclusive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year + 1, self.start_month, 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.start(), self.end_exclusive()) {
            (Some(start), Some(end)) => date >= start && date < end,
            _ => false,
        }
    }
}

// ==========================================
// DashboardSummary - 农场汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub total: i64,
}

impl SeverityCounts {
    fn add(&mut self, severity: AlertSeverity) {
        match severity {
            AlertSeverity::Critical => self.critical += 1,
            AlertSeverity::High => self.high += 1,
            AlertSeverity::Medium => self.medium += 1,
            AlertSeverity::Low => self.low += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub farm_id: String,
    pub farming_year: Option<i32>,
    pub total_blocks: i64,
    pub blocks_by_state: HashMap<BlockState, i64>,
    pub total_active_plantings: i64,
    pub avg_yield_efficiency: Option<f64>,
    pub total_predicted_yield_kg: f64,
    pub total_actual_yield_kg: f64,
    pub active_alerts: SeverityCounts,
    pub generated_at: NaiveDateTime,
}

pub struct DashboardAggregator;

/// 农业年归属日期: 种植日期, 无种植时取上次归档 (即本周期起点)
fn scope_date(block: &Block) -> Option<NaiveDate> {
    block
        .planted_date
        .or_else(|| (block.cycle_no > 1).then(|| block.cycle_started_at.date()))
}

impl DashboardAggregator {
    /// 汇总农场区块
    ///
    /// # 参数
    /// - `blocks`: 已带活跃告警的区块读模型
    /// - `farming_year`: 指定时只统计种植日期落在窗口内的区块；
    ///   尚未种植但已完成过周期的区块按上次归档日期归属
    pub fn summarize(
        farm_id: &str,
        blocks: &[Block],
        farming_year: Option<FarmingYear>,
        generated_at: NaiveDateTime,
    ) -> DashboardSummary {
        let scoped: Vec<&Block> = blocks
            .iter()
            .filter(|b| b.farm_id == farm_id)
            .filter(|b| match farming_year {
                Some(fy) => scope_date(b).map(|d| fy.contains(d)).unwrap_or(false),
                None => true,
            })
            .collect();

        let mut blocks_by_state: HashMap<BlockState, i64> =
            BlockState::ALL.iter().map(|s| (*s, 0)).collect();
        let mut active_alerts = SeverityCounts::default();
        let mut efficiency_sum = 0.0;
        let mut efficiency_n = 0usize;
        let mut total_predicted_yield_kg = 0.0;
        let mut total_actual_yield_kg = 0.0;

        for block in &scoped {
            *blocks_by_state.entry(block.state).or_insert(0) += 1;

            if let Some(eff) = block.kpi.yield_efficiency_percent {
                efficiency_sum += eff;
                efficiency_n += 1;
            }
            total_predicted_yield_kg += finite_or_zero(block.kpi.predicted_yield_kg);
            total_actual_yield_kg += finite_or_zero(block.kpi.actual_yield_kg);

            for alert in block.active_alerts.iter().filter(|a| a.is_active()) {
                active_alerts.add(alert.severity);
            }
        }

        let avg_yield_efficiency = if efficiency_n > 0 {
            Some(efficiency_sum / efficiency_n as f64)
        } else {
            None
        };

        DashboardSummary {
            farm_id: farm_id.to_string(),
            farming_year: farming_year.map(|fy| fy.year),
            total_blocks: scoped.len() as i64,
            total_active_plantings: scoped
                .iter()
                .filter(|b| b.state.is_active_planting())
                .count() as i64,
            blocks_by_state,
            avg_yield_efficiency,
            total_predicted_yield_kg,
            total_actual_yield_kg,
            active_alerts,
            generated_at,
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::Alert;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn block(id: &str, state: BlockState, eff: Option<f64>, planted: Option<NaiveDate>) -> Block {
        let mut b = Block::new(
            id.into(),
            "F1".into(),
            id.into(),
            id.into(),
            100,
            ts(),
        );
        b.state = state;
        b.planted_date = planted;
        b.kpi.yield_efficiency_percent = eff;
        if let Some(e) = eff {
            b.kpi.predicted_yield_kg = 100.0;
            b.kpi.actual_yield_kg = e;
        }
        b
    }

    fn alert(block_id: &str, severity: AlertSeverity) -> Alert {
        Alert {
            alert_id: format!("{}-{}", block_id, severity),
            block_id: block_id.into(),
            farm_id: "F1".into(),
            cycle_no: 1,
            severity,
            title: "t".into(),
            raised_at: ts(),
            raised_by: "u".into(),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            pre_block_state: BlockState::Growing,
        }
    }

    #[test]
    fn test_avg_efficiency_excludes_undefined() {
        let blocks = vec![
            block("B1", BlockState::Harvesting, Some(80.0), None),
            block("B2", BlockState::Harvesting, Some(120.0), None),
            block("B3", BlockState::Empty, None, None),
            block("B4", BlockState::Empty, None, None),
        ];
        let s = DashboardAggregator::summarize("F1", &blocks, None, ts());
        assert_eq!(s.total_blocks, 4);
        assert_eq!(s.avg_yield_efficiency, Some(100.0));
        assert_eq!(s.total_predicted_yield_kg, 200.0);
        assert_eq!(s.total_actual_yield_kg, 200.0);
        assert_eq!(s.total_active_plantings, 2);
        assert_eq!(s.blocks_by_state[&BlockState::Empty], 2);
        assert_eq!(s.blocks_by_state[&BlockState::Fruiting], 0);
    }

    #[test]
    fn test_no_efficiency_yields_none() {
        let blocks = vec![block("B1", BlockState::Empty, None, None)];
        let s = DashboardAggregator::summarize("F1", &blocks, None, ts());
        assert_eq!(s.avg_yield_efficiency, None);
    }

    #[test]
    fn test_alerts_bucketed_by_severity() {
        let mut b1 = block("B1", BlockState::Growing, None, None);
        b1.active_alerts = vec![
            alert("B1", AlertSeverity::Critical),
            alert("B1", AlertSeverity::High),
        ];
        let mut b2 = block("B2", BlockState::Growing, None, None);
        b2.active_alerts = vec![alert("B2", AlertSeverity::High)];

        let s = DashboardAggregator::summarize("F1", &[b1, b2], None, ts());
        assert_eq!(s.active_alerts.critical, 1);
        assert_eq!(s.active_alerts.high, 2);
        assert_eq!(s.active_alerts.low, 0);
        assert_eq!(s.active_alerts.total, 3);
    }

    #[test]
    fn test_farming_year_window() {
        let fy = FarmingYear::new(2024, 3);
        assert!(fy.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(fy.contains(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
        assert!(!fy.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));

        let blocks = vec![
            block("B1", BlockState::Growing, None, NaiveDate::from_ymd_opt(2024, 5, 1)),
            block("B2", BlockState::Growing, None, NaiveDate::from_ymd_opt(2024, 1, 5)),
            block("B3", BlockState::Empty, None, None),
        ];
        let s = DashboardAggregator::summarize("F1", &blocks, Some(fy), ts());
        assert_eq!(s.total_blocks, 1);
        assert_eq!(s.farming_year, Some(2024));
    }

    #[test]
    fn test_farming_year_uses_archive_date_after_reset() {
        let fy = FarmingYear::new(2024, 1);

        // 2024-04-05 归档重置, 尚未开始下一次种植
        let mut reset = block("B1", BlockState::Empty, None, None);
        reset.cycle_no = 2;
        reset.cycle_started_at = NaiveDate::from_ymd_opt(2024, 4, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let never_used = block("B2", BlockState::Empty, None, None);

        let s = DashboardAggregator::summarize("F1", &[reset.clone(), never_used], Some(fy), ts());
        assert_eq!(s.total_blocks, 1);
        assert_eq!(s.blocks_by_state[&BlockState::Empty], 1);

        let s = DashboardAggregator::summarize("F1", &[reset], Some(FarmingYear::new(2023, 1)), ts());
        assert_eq!(s.total_blocks, 0);
    }
}
