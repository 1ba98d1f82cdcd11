// ==========================================
// 农场区块生命周期 - 告警领域模型
// ==========================================
// 终态: resolved
// 对齐: block_alert 表 (按 block_id 引用区块)
// ==========================================

use crate::domain::types::{AlertSeverity, BlockState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Alert - 区块告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub alert_id: String,
    pub block_id: String,
    pub farm_id: String,
    pub cycle_no: i64, // 告警所属生产周期
    pub severity: AlertSeverity,
    pub title: String,
    pub raised_at: NaiveDateTime,
    pub raised_by: String,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub pre_block_state: BlockState, // 触发时的区块状态快照
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// 处理耗时（小时），未处理时为 None
    pub fn resolution_hours(&self) -> Option<f64> {
        self.resolved_at
            .map(|resolved| (resolved - self.raised_at).num_seconds() as f64 / 3600.0)
    }
}

// ==========================================
// AlertsSummary - 归档用告警摘要
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsSummary {
    pub total_alerts: i32,
    pub resolved_alerts: i32,
    pub average_resolution_time_hours: f64,
}
