// ==========================================
// 农场区块生命周期 - 告警规则
// ==========================================
// 触发: 快照 pre_block_state,不改变区块状态
// 处理: 处理说明长度 ≥ 阈值 (默认 10)
// 恢复: 仅当没有其他活跃告警时才恢复到 pre_block_state
// ==========================================

use crate::domain::alert::{Alert, AlertsSummary};
use crate::domain::block::{Block, StatusChange};
use crate::domain::types::{AlertSeverity, BlockState};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;

/// 默认处理说明最小长度
pub const DEFAULT_MIN_RESOLUTION_NOTES_LEN: usize = 10;

/// 告警处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct AlertResolution {
    pub resolved: Alert,
    /// 恢复后的区块；None 表示区块状态未变
    pub restored_block: Option<Block>,
}

pub struct AlertManager {
    min_notes_len: usize,
}

impl AlertManager {
    pub fn new(min_notes_len: usize) -> Self {
        Self { min_notes_len }
    }

    /// 触发告警
    pub fn raise(
        &self,
        block: &Block,
        severity: AlertSeverity,
        title: &str,
        raised_by: &str,
        raised_at: NaiveDateTime,
    ) -> EngineResult<Alert> {
        let title = title.trim();
        if title.is_empty() {
            return Err(EngineError::ValidationError("告警标题不能为空".to_string()));
        }

        Ok(Alert {
            alert_id: uuid::Uuid::new_v4().to_string(),
            block_id: block.block_id.clone(),
            farm_id: block.farm_id.clone(),
            cycle_no: block.cycle_no,
            severity,
            title: title.to_string(),
            raised_at,
            raised_by: raised_by.to_string(),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            pre_block_state: block.state,
        })
    }

    /// 处理告警
    ///
    /// # 参数
    /// - `other_active`: 除本告警外该区块仍活跃的告警数
    /// - `restore_block_status`: 是否尝试恢复区块状态
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        alert: &Alert,
        block: &Block,
        other_active: usize,
        resolution_notes: &str,
        resolved_by: &str,
        resolved_at: NaiveDateTime,
        restore_block_status: bool,
    ) -> EngineResult<AlertResolution> {
        let notes = resolution_notes.trim();
        let notes_len = notes.chars().count();
        if notes_len < self.min_notes_len {
            return Err(EngineError::ValidationError(format!(
                "处理说明至少 {} 个字符，当前 {}",
                self.min_notes_len, notes_len
            )));
        }
        if !alert.is_active() {
            return Err(EngineError::ValidationError(format!(
                "告警已处理: {}",
                alert.alert_id
            )));
        }

        let mut resolved = alert.clone();
        resolved.resolved_at = Some(resolved_at.max(alert.raised_at));
        resolved.resolved_by = Some(resolved_by.to_string());
        resolved.resolution_notes = Some(notes.to_string());

        // 进入 empty 只能经由 cleaning→empty 的归档重置
        let into_empty = alert.pre_block_state == BlockState::Empty;
        let restored_block = if restore_block_status
            && other_active == 0
            && !into_empty
            && block.state != alert.pre_block_state
        {
            let mut next = block.clone();
            next.status_change_history.push(StatusChange {
                from_state: block.state,
                to_state: alert.pre_block_state,
                changed_at: resolved_at,
                changed_by: resolved_by.to_string(),
                expected_date: None,
                offset_days: None,
                forced: false,
                note: Some(format!("告警处理后恢复状态: {}", alert.title)),
            });
            next.state = alert.pre_block_state;
            next.updated_at = resolved_at;
            Some(next)
        } else {
            None
        };

        if restore_block_status && other_active > 0 {
            tracing::debug!(
                alert_id = %alert.alert_id,
                other_active,
                "仍有其他活跃告警，区块状态保持不变"
            );
        } else if restore_block_status && into_empty && block.state != BlockState::Empty {
            tracing::debug!(
                alert_id = %alert.alert_id,
                current = %block.state,
                "告警前状态为 empty，不回退以免绕过周期归档"
            );
        }

        Ok(AlertResolution {
            resolved,
            restored_block,
        })
    }

    /// 周期告警摘要（平均处理时长只统计已处理告警）
    pub fn summarize(alerts: &[Alert]) -> AlertsSummary {
        let durations: Vec<f64> = alerts.iter().filter_map(|a| a.resolution_hours()).collect();
        let average_resolution_time_hours = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        AlertsSummary {
            total_alerts: alerts.len() as i32,
            resolved_alerts: durations.len() as i32,
            average_resolution_time_hours,
        }
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RESOLUTION_NOTES_LEN)
    }
}
