// ==========================================
// 农场区块生命周期 - 区块状态机
// ==========================================
// 周期: empty → planned → planted → growing → {fruiting → harvesting | harvesting} → cleaning → empty
// 红线: 常规路径只能走允许的边;强制变更必须持有管理员凭证
// 红线: 同状态重复变更为幂等空操作,不追加历史
// ==========================================
// 输入: 区块 + 目标状态 + 附带参数 + 作物数据
// 输出: TransitionOutcome (纯函数,不落库)
// ==========================================

use crate::domain::block::{Block, StatusChange, TransitionPayload};
use crate::domain::plant::PlantGrowthProfile;
use crate::domain::types::{BlockState, UserRole};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::timeline::TimelineCalculator;
use chrono::NaiveDateTime;

// ==========================================
// AdminCapability - 管理员强制变更凭证
// ==========================================
// 只能通过 grant 获得,持有者才能调用强制变更
#[derive(Debug, Clone)]
pub struct AdminCapability {
    actor: String,
}

impl AdminCapability {
    /// 按角色授予凭证，非管理员返回 None
    pub fn grant(role: UserRole, actor: &str) -> Option<Self> {
        if role.is_admin() {
            Some(Self {
                actor: actor.to_string(),
            })
        } else {
            None
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }
}

// ==========================================
// TransitionContext / TransitionOutcome
// ==========================================

/// 状态变更上下文
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub changed_at: NaiveDateTime,
    pub changed_by: String,
}

/// 状态变更结果
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// 目标状态与当前状态相同，不做任何修改
    NoOp,
    /// 变更已应用到新区块副本
    Applied {
        next_block: Block,
        change: StatusChange,
        /// 进入 empty 需要先归档再重置
        requires_archive: bool,
    },
}

impl TransitionOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, TransitionOutcome::NoOp)
    }
}

// ==========================================
// BlockStateMachine - 区块状态机
// ==========================================
pub struct BlockStateMachine {
    timeline: TimelineCalculator,
}

impl BlockStateMachine {
    pub fn new(timeline: TimelineCalculator) -> Self {
        Self { timeline }
    }

    /// 允许的状态边（穷举匹配，新增状态时编译器强制补全）
    pub fn is_allowed_edge(from: BlockState, to: BlockState) -> bool {
        use BlockState::*;
        match from {
            Empty => matches!(to, Planned),
            Planned => matches!(to, Planted),
            Planted => matches!(to, Growing),
            Growing => matches!(to, Fruiting | Harvesting),
            Fruiting => matches!(to, Harvesting),
            Harvesting => matches!(to, Cleaning),
            Cleaning => matches!(to, Empty),
        }
    }

    /// 当前状态可达的下一状态
    ///
    /// # 参数
    /// - `has_fruiting`: 作物是否有结果期（None = 作物未知，不做过滤）
    pub fn allowed_next_states(from: BlockState, has_fruiting: Option<bool>) -> Vec<BlockState> {
        BlockState::ALL
            .iter()
            .copied()
            .filter(|to| Self::is_allowed_edge(from, *to))
            .filter(|to| !(*to == BlockState::Fruiting && has_fruiting == Some(false)))
            .collect()
    }

    /// 周期内的"正常"下一状态（时间线推算用）
    pub fn next_in_cycle(from: BlockState, has_fruiting: bool) -> BlockState {
        use BlockState::*;
        match from {
            Empty => Planned,
            Planned => Planted,
            Planted => Growing,
            Growing if has_fruiting => Fruiting,
            Growing => Harvesting,
            Fruiting => Harvesting,
            Harvesting => Cleaning,
            Cleaning => Empty,
        }
    }

    // ==========================================
    // 常规变更
    // ==========================================

    /// 常规状态变更（只允许合法边）
    pub fn transition(
        &self,
        block: &Block,
        to: BlockState,
        payload: &TransitionPayload,
        profile: Option<&PlantGrowthProfile>,
        ctx: &TransitionContext,
    ) -> EngineResult<TransitionOutcome> {
        if block.state == to {
            return Ok(TransitionOutcome::NoOp);
        }

        if !Self::is_allowed_edge(block.state, to) {
            return Err(EngineError::InvalidTransition {
                from: block.state,
                to,
            });
        }

        // 结果期由作物数据决定
        if to == BlockState::Fruiting {
            if let Some(p) = profile {
                if !p.has_fruiting_stage() {
                    return Err(EngineError::InvalidTransition {
                        from: block.state,
                        to,
                    });
                }
            }
        }

        self.apply(block, to, payload, profile, ctx, false, None)
    }

    // ==========================================
    // 管理员强制变更
    // ==========================================

    /// 强制状态变更（绕过状态边校验，仍校验容量与必填参数）
    pub fn force_transition(
        &self,
        block: &Block,
        to: BlockState,
        payload: &TransitionPayload,
        profile: Option<&PlantGrowthProfile>,
        ctx: &TransitionContext,
        capability: &AdminCapability,
        reason: &str,
    ) -> EngineResult<TransitionOutcome> {
        if reason.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "强制变更必须提供原因（可审计性要求）".to_string(),
            ));
        }
        if block.state == to {
            return Ok(TransitionOutcome::NoOp);
        }

        let note = format!("强制变更 by {}: {}", capability.actor(), reason.trim());
        self.apply(block, to, payload, profile, ctx, true, Some(note))
    }

    // ==========================================
    // 内部实现
    // ==========================================

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        block: &Block,
        to: BlockState,
        payload: &TransitionPayload,
        profile: Option<&PlantGrowthProfile>,
        ctx: &TransitionContext,
        forced: bool,
        note: Option<String>,
    ) -> EngineResult<TransitionOutcome> {
        let mut next = block.clone();

        // 1. 附带参数校验与应用
        Self::apply_payload(&mut next, to, payload, profile)?;

        // 2. 种植日期: 首次进入 planted/growing 时以变更日为第 0 天
        if matches!(to, BlockState::Planted | BlockState::Growing) && next.planted_date.is_none() {
            next.planted_date = Some(ctx.changed_at.date());
        }

        // 3. 预测产量: planned 时按计划数量(缺省满容量)预估, planted 时按实际数量修正
        if let Some(p) = profile {
            if matches!(to, BlockState::Planned | BlockState::Planted) {
                let count = next.actual_plant_count.unwrap_or(next.max_plants);
                next.kpi.predicted_yield_kg = p.predicted_yield_kg(count);
            }
        }

        // 4. 预期日期与偏移
        let expected_date = match (next.planted_date, profile) {
            (Some(planted), Some(p)) => self.timeline.expected_date_for(to, planted, p),
            _ => None,
        };
        let offset_days = TimelineCalculator::offset_days(ctx.changed_at.date(), expected_date);

        let change = StatusChange {
            from_state: block.state,
            to_state: to,
            changed_at: ctx.changed_at,
            changed_by: ctx.changed_by.clone(),
            expected_date,
            offset_days,
            forced,
            note,
        };

        next.status_change_history.push(change.clone());
        next.state = to;
        next.updated_at = ctx.changed_at;

        tracing::debug!(
            block_id = %block.block_id,
            from = %block.state,
            to = %to,
            forced,
            offset_days = ?offset_days,
            "状态变更已推演"
        );

        Ok(TransitionOutcome::Applied {
            next_block: next,
            change,
            requires_archive: to == BlockState::Empty,
        })
    }

    fn apply_payload(
        next: &mut Block,
        to: BlockState,
        payload: &TransitionPayload,
        profile: Option<&PlantGrowthProfile>,
    ) -> EngineResult<()> {
        // 目标作物: empty→planned 必填
        if to == BlockState::Planned {
            let crop = payload
                .target_crop
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    EngineError::ValidationError("进入 planned 必须指定目标作物".to_string())
                })?;
            next.target_crop = Some(crop.to_string());
            next.target_crop_name = profile.map(|p| p.name.clone());
        } else if let Some(crop) = payload.target_crop.as_deref() {
            if !crop.trim().is_empty() {
                next.target_crop = Some(crop.trim().to_string());
                next.target_crop_name = profile.map(|p| p.name.clone());
            }
        }

        // 种植数量: 非负 + 不超容量
        if let Some(count) = payload.actual_plant_count {
            if count < 0 {
                return Err(EngineError::ValidationError(format!(
                    "种植数量不能为负数: {}",
                    count
                )));
            }
            if count > next.max_plants {
                return Err(EngineError::CapacityExceeded {
                    requested: count,
                    max: next.max_plants,
                });
            }
            next.actual_plant_count = Some(count);
        }

        // 进入 planted/growing 时必须已有种植数量
        if matches!(to, BlockState::Planted | BlockState::Growing) {
            match next.actual_plant_count {
                Some(c) if c > 0 => {}
                _ => {
                    return Err(EngineError::ValidationError(format!(
                        "进入 {} 必须提供大于 0 的实际种植数量",
                        to
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Default for BlockStateMachine {
    fn default() -> Self {
        Self::new(TimelineCalculator::default())
    }
}
