// ==========================================
// 农场区块生命周期 - 区块仓储
// ==========================================
// 红线: Repository 不含业务逻辑,只做数据映射
// 并发: 所有更新带 revision 检查 (乐观锁)
// ==========================================

use crate::domain::block::{Block, BlockKpi, QualityBreakdown, StatusChange};
use crate::domain::types::BlockState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{
    fmt_date, fmt_ts, parse_date, parse_enum, parse_json, parse_ts,
};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const BLOCK_COLUMNS: &str = r#"
    block_id, farm_id, block_code, name, max_plants, state,
    target_crop, target_crop_name, actual_plant_count, planted_date,
    status_change_history_json,
    predicted_yield_kg, actual_yield_kg, total_harvests,
    quality_a_kg, quality_b_kg, quality_c_kg, yield_efficiency_percent,
    cycle_no, revision, created_at, updated_at, cycle_started_at
"#;

// ==========================================
// BlockRepository - 区块仓储
// ==========================================
pub struct BlockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BlockRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新区块
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: 同一农场下 block_code 重复
    pub fn insert(&self, block: &Block) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let history_json = serde_json::to_string(&block.status_change_history)?;

        conn.execute(
            &format!(
                "INSERT INTO block ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                BLOCK_COLUMNS
            ),
            params![
                block.block_id,
                block.farm_id,
                block.block_code,
                block.name,
                block.max_plants,
                block.state.as_str(),
                block.target_crop,
                block.target_crop_name,
                block.actual_plant_count,
                block.planted_date.map(fmt_date),
                history_json,
                block.kpi.predicted_yield_kg,
                block.kpi.actual_yield_kg,
                block.kpi.total_harvests,
                block.kpi.quality_breakdown.a,
                block.kpi.quality_breakdown.b,
                block.kpi.quality_breakdown.c,
                block.kpi.yield_efficiency_percent,
                block.cycle_no,
                block.revision,
                fmt_ts(block.created_at),
                fmt_ts(block.updated_at),
                fmt_ts(block.cycle_started_at),
            ],
        )?;

        Ok(())
    }

    /// 更新区块（带 revision 检查）
    ///
    /// `block.revision` 为读取时的版本号，成功后返回新版本号
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配 (其他请求已更新)
    /// - `RepositoryError::NotFound`: block_id 不存在
    pub fn update(&self, block: &Block) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        update_block_on(&conn, block)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, block_id: &str) -> RepositoryResult<Option<Block>> {
        let conn = self.get_conn()?;
        find_block_on(&conn, block_id)
    }

    /// 查询农场全部区块（按 block_code 排序）
    pub fn find_by_farm(&self, farm_id: &str) -> RepositoryResult<Vec<Block>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM block WHERE farm_id = ? ORDER BY block_code ASC",
            BLOCK_COLUMNS
        ))?;

        let blocks = stmt
            .query_map(params![farm_id], map_block_row)?
            .collect::<Result<Vec<Block>, _>>()?;

        Ok(blocks)
    }

    pub fn exists_code(&self, farm_id: &str, block_code: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM block WHERE farm_id = ? AND block_code = ?",
            params![farm_id, block_code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

// ==========================================
// 连接/事务内可复用的操作
// ==========================================
// 归档+重置、告警+区块 需要在同一事务内调用

pub(crate) fn find_block_on(conn: &Connection, block_id: &str) -> RepositoryResult<Option<Block>> {
    match conn.query_row(
        &format!("SELECT {} FROM block WHERE block_id = ?", BLOCK_COLUMNS),
        params![block_id],
        map_block_row,
    ) {
        Ok(block) => Ok(Some(block)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn update_block_on(conn: &Connection, block: &Block) -> RepositoryResult<i32> {
    let history_json = serde_json::to_string(&block.status_change_history)?;

    let rows_affected = conn.execute(
        r#"UPDATE block
           SET name = ?, max_plants = ?, state = ?,
               target_crop = ?, target_crop_name = ?, actual_plant_count = ?, planted_date = ?,
               status_change_history_json = ?,
               predicted_yield_kg = ?, actual_yield_kg = ?, total_harvests = ?,
               quality_a_kg = ?, quality_b_kg = ?, quality_c_kg = ?, yield_efficiency_percent = ?,
               cycle_no = ?, cycle_started_at = ?, updated_at = ?, revision = revision + 1
           WHERE block_id = ? AND revision = ?"#,
        params![
            block.name,
            block.max_plants,
            block.state.as_str(),
            block.target_crop,
            block.target_crop_name,
            block.actual_plant_count,
            block.planted_date.map(fmt_date),
            history_json,
            block.kpi.predicted_yield_kg,
            block.kpi.actual_yield_kg,
            block.kpi.total_harvests,
            block.kpi.quality_breakdown.a,
            block.kpi.quality_breakdown.b,
            block.kpi.quality_breakdown.c,
            block.kpi.yield_efficiency_percent,
            block.cycle_no,
            fmt_ts(block.cycle_started_at),
            fmt_ts(block.updated_at),
            block.block_id,
            block.revision,
        ],
    )?;

    if rows_affected == 0 {
        // 判断是记录不存在还是 revision 冲突
        let actual: Result<i32, _> = conn.query_row(
            "SELECT revision FROM block WHERE block_id = ?",
            params![block.block_id],
            |row| row.get(0),
        );

        return match actual {
            Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                entity: "Block".to_string(),
                id: block.block_id.clone(),
                expected: block.revision,
                actual: actual_revision,
            }),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(RepositoryError::NotFound {
                entity: "Block".to_string(),
                id: block.block_id.clone(),
            }),
            Err(e) => Err(e.into()),
        };
    }

    Ok(block.revision + 1)
}

fn map_block_row(row: &rusqlite::Row) -> rusqlite::Result<Block> {
    let state: BlockState = parse_enum(5, &row.get::<_, String>(5)?)?;
    let history: Vec<StatusChange> = parse_json(10, &row.get::<_, String>(10)?)?;

    Ok(Block {
        block_id: row.get(0)?,
        farm_id: row.get(1)?,
        block_code: row.get(2)?,
        name: row.get(3)?,
        max_plants: row.get(4)?,
        state,
        target_crop: row.get(6)?,
        target_crop_name: row.get(7)?,
        actual_plant_count: row.get(8)?,
        planted_date: parse_date(9, row.get(9)?)?,
        status_change_history: history,
        kpi: BlockKpi {
            predicted_yield_kg: row.get(11)?,
            actual_yield_kg: row.get(12)?,
            total_harvests: row.get(13)?,
            quality_breakdown: QualityBreakdown {
                a: row.get(14)?,
                b: row.get(15)?,
                c: row.get(16)?,
            },
            yield_efficiency_percent: row.get(17)?,
        },
        active_alerts: Vec::new(),
        calculated: None,
        cycle_no: row.get(18)?,
        revision: row.get(19)?,
        cycle_started_at: parse_ts(22, &row.get::<_, String>(22)?)?,
        created_at: parse_ts(20, &row.get::<_, String>(20)?)?,
        updated_at: parse_ts(21, &row.get::<_, String>(21)?)?,
    })
}
