// ==========================================
// 农场区块生命周期 - 区块领域模型
// ==========================================
// 红线: state 只能是 7 个枚举值之一
// 红线: actual_plant_count ≤ max_plants
// 对齐: block 表
// ==========================================

use crate::domain::alert::Alert;
use crate::domain::types::{BlockState, PerformanceCategory, QualityGrade};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Block - 种植区块
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    // ===== 标识与配置 (跨周期保留) =====
    pub block_id: String,
    pub farm_id: String,
    pub block_code: String,
    pub name: String,
    pub max_plants: i32,

    // ===== 当前周期状态 =====
    pub state: BlockState,
    pub target_crop: Option<String>,      // 作物ID (关联 plant_growth_profile)
    pub target_crop_name: Option<String>, // 作物名称 (冗余,便于展示/归档)
    pub actual_plant_count: Option<i32>,
    pub planted_date: Option<NaiveDate>,
    pub status_change_history: Vec<StatusChange>,
    pub kpi: BlockKpi,

    // ===== 读模型字段 (不落 block 表) =====
    #[serde(default)]
    pub active_alerts: Vec<Alert>,
    #[serde(default)]
    pub calculated: Option<BlockCalculated>,

    // ===== 周期与并发控制 =====
    pub cycle_no: i64, // 周期计数器,每次 cleaning→empty +1
    pub revision: i32, // 乐观锁版本号
    pub cycle_started_at: NaiveDateTime, // 本周期起点 (开通或上次 cleaning→empty)

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Block {
    /// 开通新区块（初始为 empty，第 1 个周期）
    pub fn new(
        block_id: String,
        farm_id: String,
        block_code: String,
        name: String,
        max_plants: i32,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            block_id,
            farm_id,
            block_code,
            name,
            max_plants,
            state: BlockState::Empty,
            target_crop: None,
            target_crop_name: None,
            actual_plant_count: None,
            planted_date: None,
            status_change_history: Vec::new(),
            kpi: BlockKpi::default(),
            active_alerts: Vec::new(),
            calculated: None,
            cycle_no: 1,
            revision: 0,
            cycle_started_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// 最近一次状态变更时间（本周期无历史时取周期起点）
    pub fn last_transition_at(&self) -> NaiveDateTime {
        self.status_change_history
            .last()
            .map(|c| c.changed_at)
            .unwrap_or(self.cycle_started_at)
    }

    /// 采收完成日期 = 最近一次进入 cleaning 的日期
    pub fn harvest_completed_date(&self) -> Option<NaiveDate> {
        self.status_change_history
            .iter()
            .rev()
            .find(|c| c.to_state == BlockState::Cleaning)
            .map(|c| c.changed_at.date())
    }

    /// 种植容量占比（0-100）
    pub fn capacity_percent(&self) -> f64 {
        if self.max_plants <= 0 {
            return 0.0;
        }
        let count = self.actual_plant_count.unwrap_or(0);
        count as f64 / self.max_plants as f64 * 100.0
    }
}

// ==========================================
// StatusChange - 状态变更记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from_state: BlockState,
    pub to_state: BlockState,
    pub changed_at: NaiveDateTime,
    pub changed_by: String,
    pub expected_date: Option<NaiveDate>, // 时间线推算的预期日期
    pub offset_days: Option<i64>,         // 实际 - 预期 (正数=延迟)
    #[serde(default)]
    pub forced: bool, // 管理员强制变更
    #[serde(default)]
    pub note: Option<String>,
}

impl StatusChange {
    /// 该次变更的延迟天数 (max(0, offset))
    pub fn delay_days(&self) -> i64 {
        self.offset_days.unwrap_or(0).max(0)
    }
}

// ==========================================
// BlockKpi - 当前周期产量指标
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockKpi {
    pub predicted_yield_kg: f64,
    pub actual_yield_kg: f64,
    pub total_harvests: i32,
    pub quality_breakdown: QualityBreakdown,
    pub yield_efficiency_percent: Option<f64>, // 仅当 predicted > 0 时有值
}

// ==========================================
// QualityBreakdown - 分级产量 (kg)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityBreakdown {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
}

impl QualityBreakdown {
    pub fn add(&mut self, grade: QualityGrade, kg: f64) {
        match grade {
            QualityGrade::A => self.a += kg,
            QualityGrade::B => self.b += kg,
            QualityGrade::C => self.c += kg,
        }
    }

    pub fn total(&self) -> f64 {
        self.a + self.b + self.c
    }
}

// ==========================================
// BlockCalculated - 读时派生字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCalculated {
    pub days_in_current_state: i64,
    pub next_state: Option<BlockState>,
    pub expected_next_date: Option<NaiveDate>,
    pub days_until_next_transition: Option<i64>, // 负数 = 已逾期
    pub is_delayed: bool,
    pub delay_days: i64,
    pub capacity_percent: f64,
    pub yield_progress: Option<f64>, // min(efficiency, 100)，仅用于进度条
    pub performance_category: Option<PerformanceCategory>,
}

// ==========================================
// TransitionPayload - 状态变更附带参数
// ==========================================
// empty→planned 需要 target_crop
// 进入 planted/growing 时若尚无种植数量需要 actual_plant_count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPayload {
    pub target_crop: Option<String>,
    pub actual_plant_count: Option<i32>,
}
