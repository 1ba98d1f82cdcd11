// ==========================================
// 农场区块生命周期 - 告警 API
// ==========================================
// 职责: 触发告警、处理告警(可选恢复区块状态)、查询告警
// 红线: 告警写入与区块版本递增在同一事务
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::api::block_api::check_revision;
use crate::api::error::{ApiError, ApiResult};
use crate::api::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::alert::Alert;
use crate::domain::block::Block;
use crate::domain::types::AlertSeverity;
use crate::engine::AlertManager;
use crate::repository::{retry_once, ActionLogRepository, AlertRepository, BlockRepository};

/// 触发告警请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseAlertRequest {
    pub block_id: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub actor: String,
    #[serde(default)]
    pub expected_revision: Option<i32>,
    #[serde(default)]
    pub raised_at: Option<NaiveDateTime>,
}

/// 处理告警请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAlertRequest {
    pub alert_id: String,
    pub resolution_notes: String,
    /// 处理后尝试恢复区块到告警前状态
    #[serde(default)]
    pub restore_block_status: bool,
    pub actor: String,
    #[serde(default)]
    pub expected_revision: Option<i32>,
    #[serde(default)]
    pub resolved_at: Option<NaiveDateTime>,
}

/// 告警写操作结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertWriteResponse {
    pub alert: Alert,
    pub block: Block,
    /// 区块状态是否被恢复
    pub block_restored: bool,
}

// ==========================================
// AlertApi
// ==========================================
pub struct AlertApi {
    block_repo: Arc<BlockRepository>,
    alert_repo: Arc<AlertRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    manager: AlertManager,
}

impl AlertApi {
    /// # 参数
    /// - `min_notes_len`: 处理说明最小长度 (config: alert.min_resolution_notes_len)
    pub fn new(
        block_repo: Arc<BlockRepository>,
        alert_repo: Arc<AlertRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        min_notes_len: usize,
    ) -> Self {
        Self {
            block_repo,
            alert_repo,
            action_log_repo,
            manager: AlertManager::new(min_notes_len),
        }
    }

    /// 触发告警（区块 revision +1）
    #[instrument(skip(self, req), fields(block_id = %req.block_id, severity = %req.severity))]
    pub fn raise_alert(&self, req: RaiseAlertRequest) -> ApiResult<AlertWriteResponse> {
        let mut block = self.load_block(&req.block_id)?;
        check_revision(&block, req.expected_revision)?;

        let raised_at = req.raised_at.unwrap_or_else(now_ts);
        let alert = self
            .manager
            .raise(&block, req.severity, &req.title, &req.actor, raised_at)?;

        block.updated_at = raised_at;
        block.revision = retry_once("alert.insert_with_block", || {
            self.alert_repo.insert_with_block(&alert, &block)
        })?;

        info!(alert_id = %alert.alert_id, cycle_no = alert.cycle_no, "告警已触发");
        self.record_action(
            ActionLog::new(ActionType::RaiseAlert, &req.actor, raised_at)
                .for_block(&block.farm_id, &block.block_id)
                .with_payload(json!({
                    "alertId": alert.alert_id,
                    "severity": alert.severity,
                    "title": alert.title,
                })),
        );

        Ok(AlertWriteResponse {
            alert,
            block,
            block_restored: false,
        })
    }

    /// 处理告警
    ///
    /// # 错误
    /// - `ValidationError`: 说明过短 / 告警已处理
    /// - `NotFound`: 告警不存在
    /// - `Conflict`: expected_revision 与区块当前版本不一致
    #[instrument(skip(self, req), fields(alert_id = %req.alert_id))]
    pub fn resolve_alert(&self, req: ResolveAlertRequest) -> ApiResult<AlertWriteResponse> {
        let alert = retry_once("alert.find_by_id", || self.alert_repo.find_by_id(&req.alert_id))?
            .ok_or_else(|| ApiError::NotFound(format!("Alert(id={})不存在", req.alert_id)))?;
        let block = self.load_block(&alert.block_id)?;
        check_revision(&block, req.expected_revision)?;

        let other_active = retry_once("alert.find_active_by_block", || {
            self.alert_repo.find_active_by_block(&block.block_id)
        })?
        .iter()
        .filter(|a| a.alert_id != alert.alert_id)
        .count();

        let resolved_at = req.resolved_at.unwrap_or_else(now_ts);
        let resolution = self.manager.resolve(
            &alert,
            &block,
            other_active,
            &req.resolution_notes,
            &req.actor,
            resolved_at,
            req.restore_block_status,
        )?;

        let block_restored = resolution.restored_block.is_some();
        let mut next = resolution.restored_block.unwrap_or_else(|| {
            let mut b = block.clone();
            b.updated_at = resolved_at;
            b
        });
        let resolved = resolution.resolved;

        next.revision = retry_once("alert.resolve_with_block", || {
            self.alert_repo.resolve_with_block(&resolved, &next)
        })?;

        info!(
            alert_id = %resolved.alert_id,
            block_restored,
            other_active,
            "告警已处理"
        );
        let restored_to = block_restored.then_some(next.state);
        self.record_action(
            ActionLog::new(ActionType::ResolveAlert, &req.actor, resolved_at)
                .for_block(&next.farm_id, &next.block_id)
                .with_payload(json!({
                    "alertId": resolved.alert_id,
                    "blockRestored": block_restored,
                    "restoredTo": restored_to,
                }))
                .with_detail(req.resolution_notes.trim()),
        );

        Ok(AlertWriteResponse {
            alert: resolved,
            block: next,
            block_restored,
        })
    }

    /// 查询区块告警
    ///
    /// # 参数
    /// - `include_resolved`: false 时只返回活跃告警
    pub fn list_alerts(&self, block_id: &str, include_resolved: bool) -> ApiResult<Vec<Alert>> {
        Ok(retry_once("alert.find_by_block", || {
            self.alert_repo.find_by_block(block_id, include_resolved)
        })?)
    }

    fn load_block(&self, block_id: &str) -> ApiResult<Block> {
        retry_once("block.find_by_id", || self.block_repo.find_by_id(block_id))?
            .ok_or_else(|| ApiError::NotFound(format!("Block(id={})不存在", block_id)))
    }

    fn record_action(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }
}
