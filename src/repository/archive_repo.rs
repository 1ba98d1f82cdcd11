// ==========================================
// 农场区块生命周期 - 周期归档仓储
// ==========================================
// 红线: 归档写入 + 区块重置 + 周期告警清理 必须在同一事务中提交
// 索引: (farm_id, block_id, archived_at) 用于分页列表
// ==========================================

use crate::domain::alert::AlertsSummary;
use crate::domain::archive::BlockArchive;
use crate::domain::block::{Block, QualityBreakdown};
use crate::repository::alert_repo::delete_cycle_alerts_on;
use crate::repository::block_repo::update_block_on;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{fmt_date, fmt_ts, parse_date, parse_json, parse_ts};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const ARCHIVE_COLUMNS: &str = r#"
    archive_id, farm_id, block_id, block_code, cycle_no, target_crop_name,
    planted_date, harvest_completed_date, cycle_duration_days,
    actual_plant_count, max_plants,
    predicted_yield_kg, actual_yield_kg, yield_efficiency_percent,
    quality_a_kg, quality_b_kg, quality_c_kg, total_harvests,
    total_alerts, resolved_alerts, average_resolution_time_hours,
    status_changes_json, archived_at, archived_by_email
"#;

pub struct ArchiveRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ArchiveRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 归档周期并重置区块（原子）
    ///
    /// # 参数
    /// - `archive`: 已构建的归档
    /// - `reset_block`: 重置后的区块 (revision 为读取时版本号)
    /// - `archived_cycle_no`: 被归档的周期号，其告警随重置清理
    ///
    /// # 返回
    /// - `Ok(new_revision)`: 区块新版本号
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: 该周期已归档，整体回滚
    /// - `OptimisticLockFailure`: 区块已被其他请求修改，整体回滚
    pub fn archive_and_reset(
        &self,
        archive: &BlockArchive,
        reset_block: &Block,
        archived_cycle_no: i64,
    ) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        insert_archive_on(&tx, archive)?;
        let cleared = delete_cycle_alerts_on(&tx, &reset_block.block_id, archived_cycle_no)?;
        let revision = update_block_on(&tx, reset_block)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::debug!(
            archive_id = %archive.archive_id,
            block_id = %reset_block.block_id,
            cycle_no = archived_cycle_no,
            cleared_alerts = cleared,
            "周期归档与区块重置已提交"
        );
        Ok(revision)
    }

    /// 单独写入归档（测试/数据修复用）
    pub fn insert(&self, archive: &BlockArchive) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_archive_on(&conn, archive)
    }

    /// 永久删除归档
    ///
    /// # 返回
    /// - `Ok(true)`: 已删除; `Ok(false)`: 不存在
    pub fn delete(&self, archive_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM block_archive WHERE archive_id = ?",
            params![archive_id],
        )?;
        Ok(rows > 0)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, archive_id: &str) -> RepositoryResult<Option<BlockArchive>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            &format!("SELECT {} FROM block_archive WHERE archive_id = ?", ARCHIVE_COLUMNS),
            params![archive_id],
            map_archive_row,
        ) {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 分页查询农场归档（archived_at 倒序）
    ///
    /// # 参数
    /// - `block_id`: 可选，只看某个区块
    /// - `offset` / `limit`: 分页窗口
    ///
    /// # 返回
    /// - (当前页, 总数)
    pub fn list_by_farm(
        &self,
        farm_id: &str,
        block_id: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> RepositoryResult<(Vec<BlockArchive>, i64)> {
        let conn = self.get_conn()?;

        let total: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM block_archive
               WHERE farm_id = ?1 AND (?2 IS NULL OR block_id = ?2)"#,
            params![farm_id, block_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM block_archive
               WHERE farm_id = ?1 AND (?2 IS NULL OR block_id = ?2)
               ORDER BY archived_at DESC, cycle_no DESC
               LIMIT ?3 OFFSET ?4"#,
            ARCHIVE_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![farm_id, block_id, limit, offset], map_archive_row)?
            .collect::<Result<Vec<BlockArchive>, _>>()?;

        Ok((items, total))
    }

    pub fn count_by_block(&self, block_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM block_archive WHERE block_id = ?",
            params![block_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn insert_archive_on(conn: &Connection, a: &BlockArchive) -> RepositoryResult<()> {
    let status_changes_json = serde_json::to_string(&a.status_changes)?;

    conn.execute(
        &format!(
            "INSERT INTO block_archive ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ARCHIVE_COLUMNS
        ),
        params![
            a.archive_id,
            a.farm_id,
            a.block_id,
            a.block_code,
            a.cycle_no,
            a.target_crop_name,
            a.planted_date.map(fmt_date),
            a.harvest_completed_date.map(fmt_date),
            a.cycle_duration_days,
            a.actual_plant_count,
            a.max_plants,
            a.predicted_yield_kg,
            a.actual_yield_kg,
            a.yield_efficiency_percent,
            a.quality_breakdown.a,
            a.quality_breakdown.b,
            a.quality_breakdown.c,
            a.total_harvests,
            a.alerts_summary.total_alerts,
            a.alerts_summary.resolved_alerts,
            a.alerts_summary.average_resolution_time_hours,
            status_changes_json,
            fmt_ts(a.archived_at),
            a.archived_by_email,
        ],
    )?;
    Ok(())
}

fn map_archive_row(row: &rusqlite::Row) -> rusqlite::Result<BlockArchive> {
    Ok(BlockArchive {
        archive_id: row.get(0)?,
        farm_id: row.get(1)?,
        block_id: row.get(2)?,
        block_code: row.get(3)?,
        cycle_no: row.get(4)?,
        target_crop_name: row.get(5)?,
        planted_date: parse_date(6, row.get(6)?)?,
        harvest_completed_date: parse_date(7, row.get(7)?)?,
        cycle_duration_days: row.get(8)?,
        actual_plant_count: row.get(9)?,
        max_plants: row.get(10)?,
        predicted_yield_kg: row.get(11)?,
        actual_yield_kg: row.get(12)?,
        yield_efficiency_percent: row.get(13)?,
        quality_breakdown: QualityBreakdown {
            a: row.get(14)?,
            b: row.get(15)?,
            c: row.get(16)?,
        },
        total_harvests: row.get(17)?,
        alerts_summary: AlertsSummary {
            total_alerts: row.get(18)?,
            resolved_alerts: row.get(19)?,
            average_resolution_time_hours: row.get(20)?,
        },
        status_changes: parse_json(21, &row.get::<_, String>(21)?)?,
        archived_at: parse_ts(22, &row.get::<_, String>(22)?)?,
        archived_by_email: row.get(23)?,
    })
}
