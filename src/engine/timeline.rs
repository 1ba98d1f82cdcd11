// ==========================================
// 农场区块生命周期 - 时间线推算
// ==========================================
// 输入: 种植日期 + 作物阶段时长
// 输出: 各状态边界的预期日期 + 延迟指标
// 规则: 结果期仅在作物数据标记适用时出现,否则 growing 直接指向 harvesting
// ==========================================

use crate::domain::block::Block;
use crate::domain::plant::PlantGrowthProfile;
use crate::domain::types::BlockState;
use crate::engine::state_machine::BlockStateMachine;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// 默认清洁期 (天)
pub const DEFAULT_CLEANING_DAYS: i64 = 7;

// ==========================================
// ExpectedTimeline - 预期时间线
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedTimeline {
    pub planted: NaiveDate,
    pub growing: NaiveDate,
    pub fruiting: Option<NaiveDate>,
    pub harvesting: NaiveDate,
    pub cleaning: NaiveDate,
    pub empty: NaiveDate,
}

impl ExpectedTimeline {
    /// 某个状态的预期进入日期
    pub fn date_for(&self, state: BlockState) -> Option<NaiveDate> {
        match state {
            BlockState::Empty => Some(self.empty),
            BlockState::Planned => None,
            BlockState::Planted => Some(self.planted),
            BlockState::Growing => Some(self.growing),
            BlockState::Fruiting => self.fruiting,
            BlockState::Harvesting => Some(self.harvesting),
            BlockState::Cleaning => Some(self.cleaning),
        }
    }
}

// ==========================================
// TimelineMetrics - 读时延迟指标
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMetrics {
    pub days_in_current_state: i64,
    pub next_state: Option<BlockState>,
    pub expected_next_date: Option<NaiveDate>,
    pub days_until_next_transition: Option<i64>,
    pub is_delayed: bool,
    pub delay_days: i64,
}

// ==========================================
// TimelineCalculator
// ==========================================
#[derive(Debug, Clone)]
pub struct TimelineCalculator {
    cleaning_days: i64,
}

impl TimelineCalculator {
    pub fn new(cleaning_days: i64) -> Self {
        Self {
            cleaning_days: cleaning_days.max(0),
        }
    }

    /// 推算整条预期时间线
    pub fn expected_timeline(
        &self,
        planted_date: NaiveDate,
        profile: &PlantGrowthProfile,
    ) -> ExpectedTimeline {
        let growing = planted_date + Duration::days(profile.germination_days);
        let flowering_end =
            growing + Duration::days(profile.vegetative_days + profile.flowering_days);

        let (fruiting, harvesting) = if profile.has_fruiting_stage() {
            let fruiting_days = profile.fruiting_days.unwrap_or(0);
            (
                Some(flowering_end),
                flowering_end + Duration::days(fruiting_days),
            )
        } else {
            (None, flowering_end)
        };

        let cleaning = harvesting + Duration::days(profile.harvest_window_days);
        let empty = cleaning + Duration::days(self.cleaning_days);

        ExpectedTimeline {
            planted: planted_date,
            growing,
            fruiting,
            harvesting,
            cleaning,
            empty,
        }
    }

    /// 单个状态的预期进入日期
    pub fn expected_date_for(
        &self,
        state: BlockState,
        planted_date: NaiveDate,
        profile: &PlantGrowthProfile,
    ) -> Option<NaiveDate> {
        self.expected_timeline(planted_date, profile).date_for(state)
    }

    /// 偏移天数 = 实际 - 预期
    pub fn offset_days(actual: NaiveDate, expected: Option<NaiveDate>) -> Option<i64> {
        expected.map(|e| (actual - e).num_days())
    }

    /// 计算区块的读时时间线指标
    ///
    /// # 规则
    /// - days_until_next_transition = 预期下一变更日 - today (负数 = 已逾期)
    /// - delay_days = max(待发生变更的逾期天数, 本周期各次变更的延迟天数)
    /// - is_delayed = delay_days > 0
    pub fn metrics(
        &self,
        block: &Block,
        profile: Option<&PlantGrowthProfile>,
        today: NaiveDate,
    ) -> TimelineMetrics {
        let days_in_current_state = (today - block.last_transition_at().date()).num_days().max(0);

        let has_fruiting = profile.map(|p| p.has_fruiting_stage()).unwrap_or(false);
        let next_state = BlockStateMachine::next_in_cycle(block.state, has_fruiting);

        let expected_next_date = match (block.state, block.planted_date, profile) {
            // 清洁期以实际进入 cleaning 的日期起算
            (BlockState::Cleaning, _, _) => block
                .status_change_history
                .last()
                .filter(|c| c.to_state == BlockState::Cleaning)
                .map(|c| c.changed_at.date() + Duration::days(self.cleaning_days)),
            (_, Some(planted), Some(p)) => self.expected_date_for(next_state, planted, p),
            _ => None,
        };

        let days_until_next_transition = expected_next_date.map(|d| (d - today).num_days());
        let pending_overdue = days_until_next_transition.map(|d| (-d).max(0)).unwrap_or(0);
        // 历史在周期重置时清空, 只包含本周期的变更
        let recorded_delay = block
            .status_change_history
            .iter()
            .map(|c| c.delay_days())
            .max()
            .unwrap_or(0);
        let delay_days = pending_overdue.max(recorded_delay);

        TimelineMetrics {
            days_in_current_state,
            next_state: Some(next_state),
            expected_next_date,
            days_until_next_transition,
            is_delayed: delay_days > 0,
            delay_days,
        }
    }
}

impl Default for TimelineCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANING_DAYS)
    }
}
