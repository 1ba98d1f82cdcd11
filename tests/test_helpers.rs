// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、作物数据、区块构造等功能
// ==========================================
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use farm_block_lifecycle::api::{
    BlockApi, ProvisionBlockRequest, RecordHarvestRequest, TransitionBlockRequest,
};
use farm_block_lifecycle::app::AppState;
use farm_block_lifecycle::domain::block::{Block, TransitionPayload};
use farm_block_lifecycle::domain::plant::PlantGrowthProfile;
use farm_block_lifecycle::domain::types::{BlockState, QualityGrade};
use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

pub const FARM_ID: &str = "farm-001";
pub const OPERATOR: &str = "operator@farm.test";
pub const ADMIN: &str = "admin@farm.test";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = Connection::open(&db_path)?;
    farm_block_lifecycle::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建带作物数据的 AppState
pub fn create_test_state() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let state = AppState::new(db_path).expect("初始化AppState失败");
    seed_plants(&state);
    (temp_file, state)
}

// ==========================================
// 作物参考数据
// ==========================================

/// 番茄: 有结果期, 2kg/株
pub fn tomato() -> PlantGrowthProfile {
    PlantGrowthProfile {
        plant_id: "tomato".into(),
        name: "Tomato".into(),
        germination_days: 10,
        vegetative_days: 30,
        flowering_days: 15,
        fruiting_days: Some(20),
        harvest_window_days: 15,
        predicted_yield_per_plant_kg: 2.0,
    }
}

/// 生菜: 无结果期
pub fn lettuce() -> PlantGrowthProfile {
    PlantGrowthProfile {
        plant_id: "lettuce".into(),
        name: "Lettuce".into(),
        germination_days: 7,
        vegetative_days: 30,
        flowering_days: 0,
        fruiting_days: None,
        harvest_window_days: 14,
        predicted_yield_per_plant_kg: 0.3,
    }
}

/// 罗勒: 无结果期, 1kg/株
pub fn basil() -> PlantGrowthProfile {
    PlantGrowthProfile {
        plant_id: "basil".into(),
        name: "Basil".into(),
        germination_days: 7,
        vegetative_days: 21,
        flowering_days: 0,
        fruiting_days: None,
        harvest_window_days: 30,
        predicted_yield_per_plant_kg: 1.0,
    }
}

pub fn seed_plants(state: &AppState) {
    for p in [tomato(), lettuce(), basil()] {
        state.plant_repo.upsert(&p).expect("写入作物数据失败");
    }
}

// ==========================================
// 时间与区块构造
// ==========================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(8, 0, 0).unwrap()
}

pub fn provision(api: &BlockApi, code: &str, max_plants: i32) -> Block {
    api.provision_block(ProvisionBlockRequest {
        farm_id: FARM_ID.to_string(),
        block_code: code.to_string(),
        name: format!("Block {}", code),
        max_plants,
        actor: OPERATOR.to_string(),
        created_at: Some(at(2023, 12, 1)),
    })
    .expect("开通区块失败")
}

pub fn transition_req(
    block_id: &str,
    to: BlockState,
    payload: TransitionPayload,
    changed_at: NaiveDateTime,
) -> TransitionBlockRequest {
    TransitionBlockRequest {
        block_id: block_id.to_string(),
        new_state: to,
        payload,
        expected_revision: None,
        actor: OPERATOR.to_string(),
        changed_at: Some(changed_at),
    }
}

pub fn go(api: &BlockApi, block_id: &str, to: BlockState, changed_at: NaiveDateTime) -> Block {
    api.transition_block(transition_req(
        block_id,
        to,
        TransitionPayload::default(),
        changed_at,
    ))
    .unwrap_or_else(|e| panic!("变更到 {} 失败: {}", to, e))
}

/// 开通区块并推进到 harvesting（2024-01-01 种植）
///
/// # 参数
/// - `crop`: 作物ID (需无结果期或允许 growing→harvesting)
/// - `count`: 实际种植数量
pub fn block_in_harvesting(api: &BlockApi, code: &str, crop: &str, count: i32) -> Block {
    let block = provision(api, code, 100);
    api.transition_block(transition_req(
        &block.block_id,
        BlockState::Planned,
        TransitionPayload {
            target_crop: Some(crop.to_string()),
            actual_plant_count: None,
        },
        at(2023, 12, 20),
    ))
    .expect("planned 失败");
    api.transition_block(transition_req(
        &block.block_id,
        BlockState::Planted,
        TransitionPayload {
            target_crop: None,
            actual_plant_count: Some(count),
        },
        at(2024, 1, 1),
    ))
    .expect("planted 失败");
    go(api, &block.block_id, BlockState::Growing, at(2024, 1, 11));
    go(api, &block.block_id, BlockState::Harvesting, at(2024, 3, 1))
}

pub fn harvest_req(block_id: &str, kg: f64, grade: QualityGrade, when: NaiveDateTime) -> RecordHarvestRequest {
    RecordHarvestRequest {
        block_id: block_id.to_string(),
        harvested_kg: kg,
        grade,
        harvested_at: when,
        actor: OPERATOR.to_string(),
        expected_revision: None,
    }
}
