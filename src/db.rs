// ==========================================
// 农场区块生命周期 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建表 (init_schema)，应用启动与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
///
/// 表:
/// - schema_version / config_scope / config_kv: 版本与配置
/// - plant_growth_profile: 作物参考数据 (只读协作方的本地副本)
/// - block: 区块当前周期 (revision 乐观锁)
/// - block_alert: 告警 (按 block_id 引用)
/// - block_archive: 周期归档 (block_id + cycle_no 唯一)
/// - action_log: 审计日志
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS plant_growth_profile (
            plant_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            germination_days INTEGER NOT NULL,
            vegetative_days INTEGER NOT NULL,
            flowering_days INTEGER NOT NULL,
            fruiting_days INTEGER,
            harvest_window_days INTEGER NOT NULL,
            predicted_yield_per_plant_kg REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS block (
            block_id TEXT PRIMARY KEY,
            farm_id TEXT NOT NULL,
            block_code TEXT NOT NULL,
            name TEXT NOT NULL,
            max_plants INTEGER NOT NULL CHECK (max_plants > 0),
            state TEXT NOT NULL CHECK (state IN
                ('empty','planned','planted','growing','fruiting','harvesting','cleaning')),
            target_crop TEXT,
            target_crop_name TEXT,
            actual_plant_count INTEGER,
            planted_date TEXT,
            status_change_history_json TEXT NOT NULL DEFAULT '[]',
            predicted_yield_kg REAL NOT NULL DEFAULT 0,
            actual_yield_kg REAL NOT NULL DEFAULT 0,
            total_harvests INTEGER NOT NULL DEFAULT 0,
            quality_a_kg REAL NOT NULL DEFAULT 0,
            quality_b_kg REAL NOT NULL DEFAULT 0,
            quality_c_kg REAL NOT NULL DEFAULT 0,
            yield_efficiency_percent REAL,
            cycle_no INTEGER NOT NULL DEFAULT 1,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            cycle_started_at TEXT NOT NULL,
            UNIQUE(farm_id, block_code)
        );
        CREATE INDEX IF NOT EXISTS idx_block_farm ON block(farm_id);

        CREATE TABLE IF NOT EXISTS block_alert (
            alert_id TEXT PRIMARY KEY,
            block_id TEXT NOT NULL REFERENCES block(block_id) ON DELETE CASCADE,
            farm_id TEXT NOT NULL,
            cycle_no INTEGER NOT NULL,
            severity TEXT NOT NULL,
            title TEXT NOT NULL,
            raised_at TEXT NOT NULL,
            raised_by TEXT NOT NULL,
            resolved_at TEXT,
            resolved_by TEXT,
            resolution_notes TEXT,
            pre_block_state TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_block_alert_block ON block_alert(block_id, cycle_no);

        CREATE TABLE IF NOT EXISTS block_archive (
            archive_id TEXT PRIMARY KEY,
            farm_id TEXT NOT NULL,
            block_id TEXT NOT NULL,
            block_code TEXT NOT NULL,
            cycle_no INTEGER NOT NULL,
            target_crop_name TEXT,
            planted_date TEXT,
            harvest_completed_date TEXT,
            cycle_duration_days INTEGER,
            actual_plant_count INTEGER,
            max_plants INTEGER NOT NULL,
            predicted_yield_kg REAL NOT NULL,
            actual_yield_kg REAL NOT NULL,
            yield_efficiency_percent REAL,
            quality_a_kg REAL NOT NULL,
            quality_b_kg REAL NOT NULL,
            quality_c_kg REAL NOT NULL,
            total_harvests INTEGER NOT NULL,
            total_alerts INTEGER NOT NULL,
            resolved_alerts INTEGER NOT NULL,
            average_resolution_time_hours REAL NOT NULL,
            status_changes_json TEXT NOT NULL,
            archived_at TEXT NOT NULL,
            archived_by_email TEXT NOT NULL,
            UNIQUE(block_id, cycle_no)
        );
        CREATE INDEX IF NOT EXISTS idx_block_archive_farm_block
            ON block_archive(farm_id, block_id, archived_at);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            farm_id TEXT,
            block_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_block ON action_log(block_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }
}
