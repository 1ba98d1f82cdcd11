// ==========================================
// 农场区块生命周期 - 区块 API
// ==========================================
// 职责: 区块开通、读模型、状态变更、强制变更、采收记录
// 红线: 常规变更只走允许的状态边; 强制变更需管理员凭证并写审计
// 红线: 进入 empty 时归档 + 重置在同一事务中完成
// 并发: expected_revision 不匹配或写入时版本冲突 → Conflict
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::block::{Block, TransitionPayload};
use crate::domain::plant::PlantGrowthProfile;
use crate::domain::types::{BlockState, QualityGrade};
use crate::engine::{
    AdminCapability, ArchiveBuilder, BlockReadModel, BlockStateMachine, HarvestRecord,
    TimelineCalculator, TransitionContext, TransitionOutcome, YieldAggregator,
};
use crate::repository::{
    retry_once, ActionLogRepository, AlertRepository, ArchiveRepository, BlockRepository,
    PlantProfileRepository,
};

// ==========================================
// 请求 DTO
// ==========================================

/// 开通区块请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionBlockRequest {
    pub farm_id: String,
    pub block_code: String,
    pub name: String,
    pub max_plants: i32,
    pub actor: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// 状态变更请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBlockRequest {
    pub block_id: String,
    pub new_state: BlockState,
    #[serde(default)]
    pub payload: TransitionPayload,
    /// 调用方读取到的版本号；提供时必须与当前一致
    #[serde(default)]
    pub expected_revision: Option<i32>,
    pub actor: String,
    #[serde(default)]
    pub changed_at: Option<NaiveDateTime>,
}

/// 采收记录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHarvestRequest {
    pub block_id: String,
    pub harvested_kg: f64,
    pub grade: QualityGrade,
    pub harvested_at: NaiveDateTime,
    pub actor: String,
    #[serde(default)]
    pub expected_revision: Option<i32>,
}

// ==========================================
// BlockApi - 区块 API
// ==========================================
pub struct BlockApi {
    block_repo: Arc<BlockRepository>,
    plant_repo: Arc<PlantProfileRepository>,
    alert_repo: Arc<AlertRepository>,
    archive_repo: Arc<ArchiveRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    state_machine: BlockStateMachine,
    timeline: TimelineCalculator,
    yield_aggregator: YieldAggregator,
}

impl BlockApi {
    /// 创建新的 BlockApi 实例
    ///
    /// # 参数
    /// - `cleaning_days`: 清洁期天数 (config: timeline.cleaning_days)
    pub fn new(
        block_repo: Arc<BlockRepository>,
        plant_repo: Arc<PlantProfileRepository>,
        alert_repo: Arc<AlertRepository>,
        archive_repo: Arc<ArchiveRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        cleaning_days: i64,
    ) -> Self {
        let timeline = TimelineCalculator::new(cleaning_days);
        Self {
            block_repo,
            plant_repo,
            alert_repo,
            archive_repo,
            action_log_repo,
            state_machine: BlockStateMachine::new(timeline.clone()),
            timeline,
            yield_aggregator: YieldAggregator::new(),
        }
    }

    // ==========================================
    // 开通区块
    // ==========================================

    /// 开通新区块（初始 empty，第 1 周期）
    ///
    /// # 错误
    /// - `ValidationError`: 编码为空或 max_plants ≤ 0
    /// - `Conflict`: 同一农场下 block_code 已存在
    pub fn provision_block(&self, req: ProvisionBlockRequest) -> ApiResult<Block> {
        if req.farm_id.trim().is_empty() || req.block_code.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "farm_id 和 block_code 不能为空".to_string(),
            ));
        }
        if req.max_plants <= 0 {
            return Err(ApiError::ValidationError(format!(
                "max_plants 必须大于 0: {}",
                req.max_plants
            )));
        }
        if self
            .block_repo
            .exists_code(req.farm_id.trim(), req.block_code.trim())?
        {
            return Err(ApiError::Conflict(format!(
                "区块编码已存在: farm_id={}, block_code={}",
                req.farm_id, req.block_code
            )));
        }

        let now = req.created_at.unwrap_or_else(now_ts);
        let block = Block::new(
            uuid::Uuid::new_v4().to_string(),
            req.farm_id.trim().to_string(),
            req.block_code.trim().to_string(),
            req.name.trim().to_string(),
            req.max_plants,
            now,
        );
        retry_once("block.insert", || self.block_repo.insert(&block))?;

        info!(block_id = %block.block_id, farm_id = %block.farm_id, "区块已开通");
        self.record_action(
            ActionLog::new(ActionType::ProvisionBlock, &req.actor, now)
                .for_block(&block.farm_id, &block.block_id)
                .with_payload(json!({
                    "blockCode": block.block_code,
                    "maxPlants": block.max_plants,
                })),
        );

        Ok(block)
    }

    // ==========================================
    // 读模型
    // ==========================================

    /// 查询区块详情（带活跃告警与 calculated 字段）
    ///
    /// # 参数
    /// - `today`: 计算基准日（None = 本地当天）
    pub fn get_block(&self, block_id: &str, today: Option<NaiveDate>) -> ApiResult<Block> {
        let block = self.load_block(block_id)?;
        self.to_read_model(block, today.unwrap_or_else(|| now_ts().date()))
    }

    /// 查询农场全部区块读模型
    pub fn list_blocks(&self, farm_id: &str, today: Option<NaiveDate>) -> ApiResult<Vec<Block>> {
        let today = today.unwrap_or_else(|| now_ts().date());
        let blocks = retry_once("block.find_by_farm", || self.block_repo.find_by_farm(farm_id))?;
        blocks
            .into_iter()
            .map(|b| self.to_read_model(b, today))
            .collect()
    }

    /// 当前状态可达的下一状态（已按作物是否有结果期过滤）
    pub fn allowed_next_states(&self, block_id: &str) -> ApiResult<Vec<BlockState>> {
        let block = self.load_block(block_id)?;
        let profile = self.load_profile(block.target_crop.as_deref())?;
        Ok(BlockStateMachine::allowed_next_states(
            block.state,
            profile.as_ref().map(|p| p.has_fruiting_stage()),
        ))
    }

    /// 区块操作日志（时间倒序）
    pub fn list_block_actions(&self, block_id: &str, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_block_id(block_id, limit.max(1))?)
    }

    // ==========================================
    // 状态变更
    // ==========================================

    /// 常规状态变更
    ///
    /// # 错误
    /// - `InvalidTransition` / `CapacityExceeded` / `ValidationError`: 规则违反
    /// - `NotFound`: 区块或目标作物不存在
    /// - `Conflict`: 版本冲突 / 该周期已归档
    #[instrument(skip(self, req), fields(block_id = %req.block_id, to = %req.new_state))]
    pub fn transition_block(&self, req: TransitionBlockRequest) -> ApiResult<Block> {
        let block = self.load_block(&req.block_id)?;
        check_revision(&block, req.expected_revision)?;

        let profile = self.resolve_profile(&block, &req.payload)?;
        let ctx = TransitionContext {
            changed_at: req.changed_at.unwrap_or_else(now_ts),
            changed_by: req.actor.clone(),
        };

        let outcome = self.state_machine.transition(
            &block,
            req.new_state,
            &req.payload,
            profile.as_ref(),
            &ctx,
        )?;

        self.commit_transition(block, outcome, &ctx, ActionType::Transition, None)
    }

    /// 管理员强制变更（绕过状态边校验，写 FORCE_TRANSITION 审计）
    ///
    /// # 参数
    /// - `capability`: 由 `AdminCapability::grant` 获得
    /// - `reason`: 变更原因（必填）
    #[instrument(skip(self, req, capability), fields(block_id = %req.block_id, to = %req.new_state))]
    pub fn force_transition_block(
        &self,
        req: TransitionBlockRequest,
        capability: &AdminCapability,
        reason: &str,
    ) -> ApiResult<Block> {
        let block = self.load_block(&req.block_id)?;
        check_revision(&block, req.expected_revision)?;

        let profile = self.resolve_profile(&block, &req.payload)?;
        let ctx = TransitionContext {
            changed_at: req.changed_at.unwrap_or_else(now_ts),
            changed_by: capability.actor().to_string(),
        };

        let outcome = self.state_machine.force_transition(
            &block,
            req.new_state,
            &req.payload,
            profile.as_ref(),
            &ctx,
            capability,
            reason,
        )?;

        warn!(
            block_id = %block.block_id,
            from = %block.state,
            to = %req.new_state,
            actor = capability.actor(),
            "管理员强制变更区块状态"
        );
        self.commit_transition(
            block,
            outcome,
            &ctx,
            ActionType::ForceTransition,
            Some(reason.trim().to_string()),
        )
    }

    // ==========================================
    // 采收记录
    // ==========================================

    /// 记录一次采收
    ///
    /// # 错误
    /// - `InvalidState`: 区块不在 harvesting
    /// - `ValidationError`: 重量不是正数
    #[instrument(skip(self, req), fields(block_id = %req.block_id, kg = req.harvested_kg))]
    pub fn record_harvest(&self, req: RecordHarvestRequest) -> ApiResult<Block> {
        let block = self.load_block(&req.block_id)?;
        check_revision(&block, req.expected_revision)?;

        let harvest = HarvestRecord {
            harvested_kg: req.harvested_kg,
            grade: req.grade,
            harvested_at: req.harvested_at,
        };
        let mut next = self.yield_aggregator.record_harvest(&block, &harvest)?;
        next.revision = retry_once("block.update", || self.block_repo.update(&next))?;

        self.record_action(
            ActionLog::new(ActionType::RecordHarvest, &req.actor, req.harvested_at)
                .for_block(&next.farm_id, &next.block_id)
                .with_payload(serde_json::to_value(&harvest).unwrap_or_default()),
        );

        self.to_read_model(next, req.harvested_at.date())
    }

    // ==========================================
    // 内部实现
    // ==========================================

    fn commit_transition(
        &self,
        block: Block,
        outcome: TransitionOutcome,
        ctx: &TransitionContext,
        action_type: ActionType,
        reason: Option<String>,
    ) -> ApiResult<Block> {
        let (next, change, requires_archive) = match outcome {
            TransitionOutcome::NoOp => {
                info!(block_id = %block.block_id, state = %block.state, "目标状态与当前相同，忽略");
                return self.to_read_model(block, ctx.changed_at.date());
            }
            TransitionOutcome::Applied {
                next_block,
                change,
                requires_archive,
            } => (next_block, change, requires_archive),
        };

        let mut payload = json!({
            "from": change.from_state,
            "to": change.to_state,
            "cycleNo": block.cycle_no,
            "expectedDate": change.expected_date,
            "offsetDays": change.offset_days,
        });
        if let Some(r) = &reason {
            payload["reason"] = json!(r);
        }
        let mut log = ActionLog::new(action_type, &ctx.changed_by, ctx.changed_at)
            .for_block(&block.farm_id, &block.block_id)
            .with_payload(payload);
        if let Some(r) = reason {
            log = log.with_detail(r);
        }

        let stored = if requires_archive {
            self.archive_and_reset(&next, ctx)?
        } else {
            let mut next = next;
            next.revision = retry_once("block.update", || self.block_repo.update(&next))?;
            next
        };

        info!(
            block_id = %stored.block_id,
            from = %change.from_state,
            to = %change.to_state,
            cycle_no = stored.cycle_no,
            "区块状态已变更"
        );
        self.record_action(log);

        self.to_read_model(stored, ctx.changed_at.date())
    }

    /// 周期归档 + 区块重置（单事务）
    fn archive_and_reset(&self, finished: &Block, ctx: &TransitionContext) -> ApiResult<Block> {
        let cycle_alerts = retry_once("alert.find_by_cycle", || {
            self.alert_repo
                .find_by_cycle(&finished.block_id, finished.cycle_no)
        })?;

        let archive = ArchiveBuilder::build(finished, &cycle_alerts, ctx.changed_at, &ctx.changed_by);
        let mut reset = ArchiveBuilder::reset_for_next_cycle(finished, ctx.changed_at);

        reset.revision = retry_once("archive.archive_and_reset", || {
            self.archive_repo
                .archive_and_reset(&archive, &reset, finished.cycle_no)
        })?;

        info!(
            archive_id = %archive.archive_id,
            block_id = %finished.block_id,
            cycle_no = finished.cycle_no,
            cycle_duration_days = ?archive.cycle_duration_days,
            "周期已归档，区块进入下一周期"
        );
        self.record_action(
            ActionLog::new(ActionType::ArchiveCycle, &ctx.changed_by, ctx.changed_at)
                .for_block(&finished.farm_id, &finished.block_id)
                .with_payload(json!({
                    "archiveId": archive.archive_id,
                    "cycleNo": finished.cycle_no,
                })),
        );

        Ok(reset)
    }

    fn load_block(&self, block_id: &str) -> ApiResult<Block> {
        retry_once("block.find_by_id", || self.block_repo.find_by_id(block_id))?
            .ok_or_else(|| ApiError::NotFound(format!("Block(id={})不存在", block_id)))
    }

    fn load_profile(&self, crop: Option<&str>) -> ApiResult<Option<PlantGrowthProfile>> {
        match crop {
            Some(id) => Ok(retry_once("plant.find_by_id", || self.plant_repo.find_by_id(id))?),
            None => Ok(None),
        }
    }

    /// 本次变更使用的作物数据：请求指定的新作物优先，其次区块当前作物
    fn resolve_profile(
        &self,
        block: &Block,
        payload: &TransitionPayload,
    ) -> ApiResult<Option<PlantGrowthProfile>> {
        let requested = payload
            .target_crop
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        match requested {
            Some(crop) => match self.load_profile(Some(crop))? {
                Some(p) => Ok(Some(p)),
                None => Err(ApiError::NotFound(format!(
                    "PlantGrowthProfile(id={})不存在",
                    crop
                ))),
            },
            None => self.load_profile(block.target_crop.as_deref()),
        }
    }

    fn to_read_model(&self, mut block: Block, today: NaiveDate) -> ApiResult<Block> {
        let active_alerts = retry_once("alert.find_active_by_block", || {
            self.alert_repo.find_active_by_block(&block.block_id)
        })?;
        block.active_alerts = active_alerts;
        let profile = self.load_profile(block.target_crop.as_deref())?;
        Ok(BlockReadModel::new(&self.timeline).enrich(block, profile.as_ref(), today))
    }

    /// 记录操作日志，失败时只记录警告（不影响主要操作）
    fn record_action(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }
}

/// 调用方携带的版本号必须与当前一致
pub(crate) fn check_revision(block: &Block, expected: Option<i32>) -> ApiResult<()> {
    match expected {
        Some(rev) if rev != block.revision => Err(ApiError::Conflict(format!(
            "Block(id={})已被其他请求修改（期望revision={}，实际revision={}）",
            block.block_id, rev, block.revision
        ))),
        _ => Ok(()),
    }
}
