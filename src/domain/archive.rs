// ==========================================
// 农场区块生命周期 - 周期归档领域模型
// ==========================================
// 红线: 每个周期只归档一次 (block_id + cycle_no 唯一)
// 红线: 归档写入后不可修改,只允许管理员删除
// 对齐: block_archive 表
// ==========================================

use crate::domain::alert::AlertsSummary;
use crate::domain::block::{QualityBreakdown, StatusChange};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// BlockArchive - 已完成周期快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockArchive {
    pub archive_id: String,
    pub farm_id: String,
    pub block_id: String,
    pub block_code: String,
    pub cycle_no: i64,
    pub target_crop_name: Option<String>,

    // ===== 时间 =====
    pub planted_date: Option<NaiveDate>,
    pub harvest_completed_date: Option<NaiveDate>,
    pub cycle_duration_days: Option<i64>,

    // ===== 容量 =====
    pub actual_plant_count: Option<i32>,
    pub max_plants: i32,

    // ===== 产量 =====
    pub predicted_yield_kg: f64,
    pub actual_yield_kg: f64,
    pub yield_efficiency_percent: Option<f64>,
    pub quality_breakdown: QualityBreakdown,
    pub total_harvests: i32,

    // ===== 告警与历史 =====
    pub alerts_summary: AlertsSummary,
    pub status_changes: Vec<StatusChange>,

    pub archived_at: NaiveDateTime,
    pub archived_by_email: String,
}

// ==========================================
// ArchivePage - 分页结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePage {
    pub items: Vec<BlockArchive>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
