// ==========================================
// 农场区块生命周期 - 告警仓储
// ==========================================
// 告警按 block_id 引用区块
// 触发/处理与区块 revision 递增在同一事务中提交
// ==========================================

use crate::domain::alert::Alert;
use crate::domain::block::Block;
use crate::repository::block_repo::update_block_on;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{fmt_ts, parse_enum, parse_opt_ts, parse_ts};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const ALERT_COLUMNS: &str = r#"
    alert_id, block_id, farm_id, cycle_no, severity, title,
    raised_at, raised_by, resolved_at, resolved_by, resolution_notes, pre_block_state
"#;

pub struct AlertRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AlertRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作 (事务)
    // ==========================================

    /// 插入告警并递增区块 revision
    ///
    /// # 返回
    /// - `Ok(new_revision)`: 区块新版本号
    pub fn insert_with_block(&self, alert: &Alert, block: &Block) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        insert_alert_on(&tx, alert)?;
        let revision = update_block_on(&tx, block)?;

        tx.commit()?;
        Ok(revision)
    }

    /// 写入告警处理结果，同时更新区块（恢复状态或仅递增 revision）
    pub fn resolve_with_block(&self, alert: &Alert, block: &Block) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            r#"UPDATE block_alert
               SET resolved_at = ?, resolved_by = ?, resolution_notes = ?
               WHERE alert_id = ? AND resolved_at IS NULL"#,
            params![
                alert.resolved_at.map(fmt_ts),
                alert.resolved_by,
                alert.resolution_notes,
                alert.alert_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ActiveAlert".to_string(),
                id: alert.alert_id.clone(),
            });
        }

        let revision = update_block_on(&tx, block)?;

        tx.commit()?;
        Ok(revision)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, alert_id: &str) -> RepositoryResult<Option<Alert>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            &format!("SELECT {} FROM block_alert WHERE alert_id = ?", ALERT_COLUMNS),
            params![alert_id],
            map_alert_row,
        ) {
            Ok(alert) => Ok(Some(alert)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 区块活跃告警（按触发时间升序）
    pub fn find_active_by_block(&self, block_id: &str) -> RepositoryResult<Vec<Alert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM block_alert WHERE block_id = ? AND resolved_at IS NULL ORDER BY raised_at ASC, rowid ASC",
            ALERT_COLUMNS
        ))?;
        let alerts = stmt
            .query_map(params![block_id], map_alert_row)?
            .collect::<Result<Vec<Alert>, _>>()?;
        Ok(alerts)
    }

    /// 区块告警（可包含已处理）
    pub fn find_by_block(
        &self,
        block_id: &str,
        include_resolved: bool,
    ) -> RepositoryResult<Vec<Alert>> {
        if !include_resolved {
            return self.find_active_by_block(block_id);
        }
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM block_alert WHERE block_id = ? ORDER BY raised_at ASC, rowid ASC",
            ALERT_COLUMNS
        ))?;
        let alerts = stmt
            .query_map(params![block_id], map_alert_row)?
            .collect::<Result<Vec<Alert>, _>>()?;
        Ok(alerts)
    }

    /// 农场全部活跃告警（驾驶舱用）
    pub fn find_active_by_farm(&self, farm_id: &str) -> RepositoryResult<Vec<Alert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM block_alert WHERE farm_id = ? AND resolved_at IS NULL ORDER BY raised_at ASC",
            ALERT_COLUMNS
        ))?;
        let alerts = stmt
            .query_map(params![farm_id], map_alert_row)?
            .collect::<Result<Vec<Alert>, _>>()?;
        Ok(alerts)
    }

    /// 区块某周期的全部告警（归档摘要用）
    pub fn find_by_cycle(&self, block_id: &str, cycle_no: i64) -> RepositoryResult<Vec<Alert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM block_alert WHERE block_id = ? AND cycle_no = ? ORDER BY raised_at ASC",
            ALERT_COLUMNS
        ))?;
        let alerts = stmt
            .query_map(params![block_id, cycle_no], map_alert_row)?
            .collect::<Result<Vec<Alert>, _>>()?;
        Ok(alerts)
    }
}

// ==========================================
// 事务内可复用的操作
// ==========================================

pub(crate) fn insert_alert_on(conn: &Connection, alert: &Alert) -> RepositoryResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO block_alert ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ALERT_COLUMNS
        ),
        params![
            alert.alert_id,
            alert.block_id,
            alert.farm_id,
            alert.cycle_no,
            alert.severity.as_str(),
            alert.title,
            fmt_ts(alert.raised_at),
            alert.raised_by,
            alert.resolved_at.map(fmt_ts),
            alert.resolved_by,
            alert.resolution_notes,
            alert.pre_block_state.as_str(),
        ],
    )?;
    Ok(())
}

/// 周期重置时清除该周期告警
pub(crate) fn delete_cycle_alerts_on(
    conn: &Connection,
    block_id: &str,
    cycle_no: i64,
) -> RepositoryResult<usize> {
    let rows = conn.execute(
        "DELETE FROM block_alert WHERE block_id = ? AND cycle_no = ?",
        params![block_id, cycle_no],
    )?;
    Ok(rows)
}

fn map_alert_row(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
    Ok(Alert {
        alert_id: row.get(0)?,
        block_id: row.get(1)?,
        farm_id: row.get(2)?,
        cycle_no: row.get(3)?,
        severity: parse_enum(4, &row.get::<_, String>(4)?)?,
        title: row.get(5)?,
        raised_at: parse_ts(6, &row.get::<_, String>(6)?)?,
        raised_by: row.get(7)?,
        resolved_at: parse_opt_ts(8, row.get(8)?)?,
        resolved_by: row.get(9)?,
        resolution_notes: row.get(10)?,
        pre_block_state: parse_enum(11, &row.get::<_, String>(11)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::{AlertSeverity, BlockState};
    use crate::repository::block_repo::BlockRepository;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup() -> (BlockRepository, AlertRepository) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let blocks = BlockRepository::new(conn.clone());
        blocks
            .insert(&Block::new(
                "B1".into(),
                "F1".into(),
                "A-01".into(),
                "Bed".into(),
                10,
                ts(0),
            ))
            .unwrap();
        (blocks, AlertRepository::new(conn))
    }

    fn alert(id: &str, at: NaiveDateTime) -> Alert {
        Alert {
            alert_id: id.into(),
            block_id: "B1".into(),
            farm_id: "F1".into(),
            cycle_no: 1,
            severity: AlertSeverity::High,
            title: "Pest".into(),
            raised_at: at,
            raised_by: "u".into(),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            pre_block_state: BlockState::Empty,
        }
    }

    #[test]
    fn test_insert_and_resolve_bump_block_revision() {
        let (blocks, alerts) = setup();
        let block = blocks.find_by_id("B1").unwrap().unwrap();
        let a = alert("a1", ts(1));
        assert_eq!(alerts.insert_with_block(&a, &block).unwrap(), 1);
        assert_eq!(alerts.find_active_by_block("B1").unwrap().len(), 1);

        let block = blocks.find_by_id("B1").unwrap().unwrap();
        let mut resolved = a.clone();
        resolved.resolved_at = Some(ts(3));
        resolved.resolved_by = Some("u".into());
        resolved.resolution_notes = Some("Sprayed neem oil".into());
        assert_eq!(alerts.resolve_with_block(&resolved, &block).unwrap(), 2);

        assert!(alerts.find_active_by_block("B1").unwrap().is_empty());
        let all = alerts.find_by_block("B1", true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].resolution_hours(), Some(2.0));
        assert!(alerts.find_active_by_farm("F1").unwrap().is_empty());
    }

    #[test]
    fn test_stale_block_rolls_back_alert_insert() {
        let (blocks, alerts) = setup();
        let mut stale = blocks.find_by_id("B1").unwrap().unwrap();
        stale.revision = 9;
        let err = alerts.insert_with_block(&alert("a1", ts(1)), &stale).unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));
        assert!(alerts.find_by_id("a1").unwrap().is_none());
    }

    #[test]
    fn test_resolve_twice_is_not_found() {
        let (blocks, alerts) = setup();
        let block = blocks.find_by_id("B1").unwrap().unwrap();
        let a = alert("a1", ts(1));
        alerts.insert_with_block(&a, &block).unwrap();

        let mut resolved = a.clone();
        resolved.resolved_at = Some(ts(2));
        let block = blocks.find_by_id("B1").unwrap().unwrap();
        alerts.resolve_with_block(&resolved, &block).unwrap();

        let block = blocks.find_by_id("B1").unwrap().unwrap();
        let err = alerts.resolve_with_block(&resolved, &block).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_delete_cycle_alerts() {
        let (blocks, alerts) = setup();
        let block = blocks.find_by_id("B1").unwrap().unwrap();
        alerts.insert_with_block(&alert("a1", ts(1)), &block).unwrap();
        assert_eq!(alerts.find_by_cycle("B1", 1).unwrap().len(), 1);

        let conn = alerts.get_conn().unwrap();
        assert_eq!(delete_cycle_alerts_on(&conn, "B1", 1).unwrap(), 1);
        drop(conn);
        assert!(alerts.find_by_cycle("B1", 1).unwrap().is_empty());
    }
}
