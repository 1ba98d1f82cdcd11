// ==========================================
// 农场区块生命周期 - 周期归档构建
// ==========================================
// 触发: 只在进入 empty 的变更中调用,不对外暴露
// 输出: BlockArchive 快照 + 重置后的区块 (由仓储层在同一事务中落库)
// ==========================================

use crate::domain::alert::Alert;
use crate::domain::archive::BlockArchive;
use crate::domain::block::{Block, BlockKpi};
use crate::domain::types::BlockState;
use crate::engine::alert_rules::AlertManager;
use chrono::NaiveDateTime;

pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// 根据周期结束时的区块构建归档
    ///
    /// # 参数
    /// - `block`: 已追加 →empty 变更记录、尚未重置的区块
    /// - `cycle_alerts`: 本周期内触发的全部告警 (含已处理)
    pub fn build(
        block: &Block,
        cycle_alerts: &[Alert],
        archived_at: NaiveDateTime,
        archived_by_email: &str,
    ) -> BlockArchive {
        let alerts: Vec<Alert> = cycle_alerts
            .iter()
            .filter(|a| a.cycle_no == block.cycle_no)
            .cloned()
            .collect();

        let harvest_completed_date = block.harvest_completed_date();
        let cycle_duration_days = match (block.planted_date, harvest_completed_date) {
            (Some(planted), Some(done)) => Some((done - planted).num_days()),
            _ => None,
        };

        BlockArchive {
            archive_id: uuid::Uuid::new_v4().to_string(),
            farm_id: block.farm_id.clone(),
            block_id: block.block_id.clone(),
            block_code: block.block_code.clone(),
            cycle_no: block.cycle_no,
            target_crop_name: block
                .target_crop_name
                .clone()
                .or_else(|| block.target_crop.clone()),
            planted_date: block.planted_date,
            harvest_completed_date,
            cycle_duration_days,
            actual_plant_count: block.actual_plant_count,
            max_plants: block.max_plants,
            predicted_yield_kg: block.kpi.predicted_yield_kg,
            actual_yield_kg: block.kpi.actual_yield_kg,
            yield_efficiency_percent: block.kpi.yield_efficiency_percent,
            quality_breakdown: block.kpi.quality_breakdown.clone(),
            total_harvests: block.kpi.total_harvests,
            alerts_summary: AlertManager::summarize(&alerts),
            status_changes: block.status_change_history.clone(),
            archived_at,
            archived_by_email: archived_by_email.to_string(),
        }
    }

    /// 重置区块进入下一周期（标识与配置保留）
    pub fn reset_for_next_cycle(block: &Block, now: NaiveDateTime) -> Block {
        Block {
            block_id: block.block_id.clone(),
            farm_id: block.farm_id.clone(),
            block_code: block.block_code.clone(),
            name: block.name.clone(),
            max_plants: block.max_plants,
            state: BlockState::Empty,
            target_crop: None,
            target_crop_name: None,
            actual_plant_count: None,
            planted_date: None,
            status_change_history: Vec::new(),
            kpi: BlockKpi::default(),
            active_alerts: Vec::new(),
            calculated: None,
            cycle_no: block.cycle_no + 1,
            revision: block.revision,
            cycle_started_at: now,
            created_at: block.created_at,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::StatusChange;
    use crate::domain::types::{AlertSeverity, QualityGrade};
    use chrono::NaiveDate;

    fn ts(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn change(from: BlockState, to: BlockState, at: NaiveDateTime) -> StatusChange {
        StatusChange {
            from_state: from,
            to_state: to,
            changed_at: at,
            changed_by: "grower@farm".into(),
            expected_date: None,
            offset_days: None,
            forced: false,
            note: None,
        }
    }

    fn finished_block() -> Block {
        let mut b = Block::new(
            "B5".into(),
            "F1".into(),
            "B-05".into(),
            "Bed 5".into(),
            100,
            ts(1, 1),
        );
        b.state = BlockState::Empty;
        b.target_crop = Some("tomato".into());
        b.target_crop_name = Some("Tomato".into());
        b.actual_plant_count = Some(80);
        b.planted_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        b.kpi.predicted_yield_kg = 160.0;
        b.kpi.actual_yield_kg = 120.0;
        b.kpi.total_harvests = 3;
        b.kpi.quality_breakdown.add(QualityGrade::A, 100.0);
        b.kpi.quality_breakdown.add(QualityGrade::B, 20.0);
        b.kpi.yield_efficiency_percent = Some(75.0);
        b.status_change_history = vec![
            change(BlockState::Harvesting, BlockState::Cleaning, ts(4, 1)),
            change(BlockState::Cleaning, BlockState::Empty, ts(4, 5)),
        ];
        b.revision = 12;
        b
    }

    #[test]
    fn test_build_archive_from_finished_cycle() {
        let b = finished_block();
        let mut resolved = Alert {
            alert_id: "a1".into(),
            block_id: "B5".into(),
            farm_id: "F1".into(),
            cycle_no: 1,
            severity: AlertSeverity::High,
            title: "Pest".into(),
            raised_at: ts(2, 1),
            raised_by: "u".into(),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            pre_block_state: BlockState::Growing,
        };
        let open = resolved.clone();
        resolved.resolved_at = Some(ts(2, 2));
        let mut stale = resolved.clone();
        stale.cycle_no = 0;

        let archive = ArchiveBuilder::build(&b, &[resolved, open, stale], ts(4, 5), "grower@farm");
        assert_eq!(archive.cycle_duration_days, Some(91));
        assert_eq!(archive.harvest_completed_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(archive.actual_yield_kg, 120.0);
        assert_eq!(archive.total_harvests, 3);
        assert_eq!(archive.yield_efficiency_percent, Some(75.0));
        assert_eq!(archive.target_crop_name.as_deref(), Some("Tomato"));
        assert_eq!(archive.status_changes.len(), 2);
        assert_eq!(archive.alerts_summary.total_alerts, 2);
        assert_eq!(archive.alerts_summary.resolved_alerts, 1);
        assert_eq!(archive.alerts_summary.average_resolution_time_hours, 24.0);
    }

    #[test]
    fn test_reset_keeps_identity_and_bumps_cycle() {
        let b = finished_block();
        let reset = ArchiveBuilder::reset_for_next_cycle(&b, ts(4, 5));
        assert_eq!(reset.block_id, "B5");
        assert_eq!(reset.block_code, "B-05");
        assert_eq!(reset.max_plants, 100);
        assert_eq!(reset.state, BlockState::Empty);
        assert_eq!(reset.kpi, BlockKpi::default());
        assert!(reset.planted_date.is_none());
        assert!(reset.status_change_history.is_empty());
        assert_eq!(reset.cycle_no, 2);
        assert_eq!(reset.revision, 12);
    }
}
