// ==========================================
// 农场区块生命周期 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope, 当前只使用 global)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 类型化读取 (格式错误时回退默认值) =====

    fn get_parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 告警处理说明最小长度
    pub fn get_min_resolution_notes_len(&self) -> Result<usize, Box<dyn Error>> {
        self.get_parsed_or(config_keys::MIN_RESOLUTION_NOTES_LEN, 10)
    }

    /// 清洁期天数
    pub fn get_cleaning_days(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or(config_keys::CLEANING_DAYS, 7)
    }

    /// 驾驶舱轮询间隔（秒，最小 1）
    pub fn get_dashboard_poll_interval_secs(&self) -> Result<u64, Box<dyn Error>> {
        Ok(self.get_parsed_or(config_keys::POLL_INTERVAL_SECS, 30u64)?.max(1))
    }

    /// 农业年度起始月份（1-12）
    pub fn get_farming_year_start_month(&self) -> Result<u32, Box<dyn Error>> {
        let month: u32 = self.get_parsed_or(config_keys::FARMING_YEAR_START_MONTH, 1)?;
        if (1..=12).contains(&month) {
            Ok(month)
        } else {
            tracing::warn!(month, "农业年度起始月份越界，使用 1 月");
            Ok(1)
        }
    }

    /// 归档分页默认页大小
    pub fn get_archive_default_page_size(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.get_parsed_or(config_keys::ARCHIVE_DEFAULT_PAGE_SIZE, 20u32)?.max(1))
    }

    /// 归档分页最大页大小
    pub fn get_archive_max_page_size(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.get_parsed_or(config_keys::ARCHIVE_MAX_PAGE_SIZE, 100u32)?.max(1))
    }

    /// 一次性读取生命周期配置
    pub fn load_lifecycle_config(&self) -> Result<LifecycleConfig, Box<dyn Error>> {
        Ok(LifecycleConfig {
            min_resolution_notes_len: self.get_min_resolution_notes_len()?,
            cleaning_days: self.get_cleaning_days()?,
            dashboard_poll_interval_secs: self.get_dashboard_poll_interval_secs()?,
            farming_year_start_month: self.get_farming_year_start_month()?,
            archive_default_page_size: self.get_archive_default_page_size()?,
            archive_max_page_size: self.get_archive_max_page_size()?,
        })
    }
}

// ==========================================
// LifecycleConfig - 生命周期配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    pub min_resolution_notes_len: usize,
    pub cleaning_days: i64,
    pub dashboard_poll_interval_secs: u64,
    pub farming_year_start_month: u32,
    pub archive_default_page_size: u32,
    pub archive_max_page_size: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_resolution_notes_len: 10,
            cleaning_days: 7,
            dashboard_poll_interval_secs: 30,
            farming_year_start_month: 1,
            archive_default_page_size: 20,
            archive_max_page_size: 100,
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 告警
    pub const MIN_RESOLUTION_NOTES_LEN: &str = "alert.min_resolution_notes_len";

    // 时间线
    pub const CLEANING_DAYS: &str = "timeline.cleaning_days";

    // 驾驶舱
    pub const POLL_INTERVAL_SECS: &str = "dashboard.poll_interval_secs";
    pub const FARMING_YEAR_START_MONTH: &str = "dashboard.farming_year_start_month";

    // 归档分页
    pub const ARCHIVE_DEFAULT_PAGE_SIZE: &str = "archive.default_page_size";
    pub const ARCHIVE_MAX_PAGE_SIZE: &str = "archive.max_page_size";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cm = manager();
        assert_eq!(cm.load_lifecycle_config().unwrap(), LifecycleConfig::default());
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let cm = manager();
        cm.set_global_config_value(config_keys::MIN_RESOLUTION_NOTES_LEN, "20").unwrap();
        cm.set_global_config_value(config_keys::CLEANING_DAYS, "abc").unwrap();
        cm.set_global_config_value(config_keys::FARMING_YEAR_START_MONTH, "13").unwrap();
        cm.set_global_config_value(config_keys::POLL_INTERVAL_SECS, "0").unwrap();

        assert_eq!(cm.get_min_resolution_notes_len().unwrap(), 20);
        assert_eq!(cm.get_cleaning_days().unwrap(), 7);
        assert_eq!(cm.get_farming_year_start_month().unwrap(), 1);
        assert_eq!(cm.get_dashboard_poll_interval_secs().unwrap(), 1);

        let snapshot: HashMap<String, String> =
            serde_json::from_str(&cm.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get(config_keys::MIN_RESOLUTION_NOTES_LEN).map(String::as_str), Some("20"));
    }
}
