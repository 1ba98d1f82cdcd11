// ==========================================
// 农场区块生命周期 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录 (强制变更、归档删除必须可审计)
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub farm_id: Option<String>,
    pub block_id: Option<String>,
    pub action_type: String, // 存储为字符串 (ActionType::as_str)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ProvisionBlock,
    Transition,
    ForceTransition, // 管理员绕过状态表
    RecordHarvest,
    RaiseAlert,
    ResolveAlert,
    ArchiveCycle,
    DeleteArchive,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ProvisionBlock => "PROVISION_BLOCK",
            ActionType::Transition => "TRANSITION",
            ActionType::ForceTransition => "FORCE_TRANSITION",
            ActionType::RecordHarvest => "RECORD_HARVEST",
            ActionType::RaiseAlert => "RAISE_ALERT",
            ActionType::ResolveAlert => "RESOLVE_ALERT",
            ActionType::ArchiveCycle => "ARCHIVE_CYCLE",
            ActionType::DeleteArchive => "DELETE_ARCHIVE",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PROVISION_BLOCK" => Some(ActionType::ProvisionBlock),
            "TRANSITION" => Some(ActionType::Transition),
            "FORCE_TRANSITION" => Some(ActionType::ForceTransition),
            "RECORD_HARVEST" => Some(ActionType::RecordHarvest),
            "RAISE_ALERT" => Some(ActionType::RaiseAlert),
            "RESOLVE_ALERT" => Some(ActionType::ResolveAlert),
            "ARCHIVE_CYCLE" => Some(ActionType::ArchiveCycle),
            "DELETE_ARCHIVE" => Some(ActionType::DeleteArchive),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(action_type: ActionType, actor: &str, action_ts: NaiveDateTime) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            farm_id: None,
            block_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    /// 关联区块
    pub fn for_block(mut self, farm_id: &str, block_id: &str) -> Self {
        self.farm_id = Some(farm_id.to_string());
        self.block_id = Some(block_id.to_string());
        self
    }

    /// 设置操作负载
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn typed_action(&self) -> Option<ActionType> {
        ActionType::from_str(&self.action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_action_type_round_trip() {
        for t in [
            ActionType::ProvisionBlock,
            ActionType::Transition,
            ActionType::ForceTransition,
            ActionType::RecordHarvest,
            ActionType::RaiseAlert,
            ActionType::ResolveAlert,
            ActionType::ArchiveCycle,
            ActionType::DeleteArchive,
        ] {
            assert_eq!(ActionType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(ActionType::from_str("Import"), None);
    }

    #[test]
    fn test_builder() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let log = ActionLog::new(ActionType::ForceTransition, "admin@farm", ts)
            .for_block("f1", "b1")
            .with_detail("补录");
        assert_eq!(log.block_id.as_deref(), Some("b1"));
        assert_eq!(log.typed_action(), Some(ActionType::ForceTransition));
        assert_eq!(log.action_id.len(), 36);
    }
}
