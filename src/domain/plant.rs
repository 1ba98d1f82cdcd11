// ==========================================
// 农场区块生命周期 - 作物参考数据 (只读)
// ==========================================
// 来源: Plant Reference Data 外部协作方
// 用途: 时间线推算 + 预测产量
// 对齐: plant_growth_profile 表
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// PlantGrowthProfile - 作物生长周期
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantGrowthProfile {
    pub plant_id: String,
    pub name: String,

    // ===== 阶段时长 (天) =====
    pub germination_days: i64,
    pub vegetative_days: i64,
    pub flowering_days: i64,
    pub fruiting_days: Option<i64>, // None 表示该作物没有结果期
    pub harvest_window_days: i64,

    // ===== 产量 =====
    pub predicted_yield_per_plant_kg: f64,
}

impl PlantGrowthProfile {
    /// 作物是否包含结果期
    pub fn has_fruiting_stage(&self) -> bool {
        self.fruiting_days.map(|d| d > 0).unwrap_or(false)
    }

    /// 从种植到采收结束的总天数
    pub fn total_cycle_days(&self) -> i64 {
        self.germination_days
            + self.vegetative_days
            + self.flowering_days
            + self.fruiting_days.unwrap_or(0)
            + self.harvest_window_days
    }

    /// 按种植数量推算预测产量 (kg)
    pub fn predicted_yield_kg(&self, plant_count: i32) -> f64 {
        plant_count.max(0) as f64 * self.predicted_yield_per_plant_kg
    }
}
