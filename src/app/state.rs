// ==========================================
// 农场区块生命周期 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约束: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AlertApi, ArchiveApi, BlockApi, DashboardApi};
use crate::config::{ConfigManager, LifecycleConfig};
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::repository::{
    ActionLogRepository, AlertRepository, ArchiveRepository, BlockRepository,
    PlantProfileRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FARM_BLOCK_DB_PATH";

/// 应用状态
pub struct AppState {
    pub db_path: String,
    pub config: LifecycleConfig,
    pub config_manager: Arc<ConfigManager>,

    pub block_api: Arc<BlockApi>,
    pub alert_api: Arc<AlertApi>,
    pub archive_api: Arc<ArchiveApi>,
    pub dashboard_api: Arc<DashboardApi>,

    /// 作物参考数据（供初始化/同步写入）
    pub plant_repo: Arc<PlantProfileRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径 (":memory:" 亦可)
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(v)) if v > CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema 版本高于当前程序"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "读取 schema_version 失败(将继续启动)"),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_lifecycle_config()
            .map_err(|e| format!("加载配置失败: {}", e))?;
        tracing::info!(?config, "生命周期配置已加载");

        // ==========================================
        // Repository层
        // ==========================================
        let block_repo = Arc::new(BlockRepository::new(conn.clone()));
        let plant_repo = Arc::new(PlantProfileRepository::new(conn.clone()));
        let alert_repo = Arc::new(AlertRepository::new(conn.clone()));
        let archive_repo = Arc::new(ArchiveRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));

        // ==========================================
        // API层
        // ==========================================
        let block_api = Arc::new(BlockApi::new(
            block_repo.clone(),
            plant_repo.clone(),
            alert_repo.clone(),
            archive_repo.clone(),
            action_log_repo.clone(),
            config.cleaning_days,
        ));
        let alert_api = Arc::new(AlertApi::new(
            block_repo.clone(),
            alert_repo.clone(),
            action_log_repo.clone(),
            config.min_resolution_notes_len,
        ));
        let archive_api = Arc::new(ArchiveApi::new(
            archive_repo,
            action_log_repo.clone(),
            config.archive_default_page_size,
            config.archive_max_page_size,
        ));
        let dashboard_api = Arc::new(DashboardApi::new(
            block_repo,
            alert_repo,
            config.farming_year_start_month,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            config,
            config_manager,
            block_api,
            alert_api,
            archive_api,
            dashboard_api,
            plant_repo,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用 FARM_BLOCK_DB_PATH，其次用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./farm_block_lifecycle.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("farm-block-lifecycle");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("farm_block_lifecycle.db");
        }
    }

    path.to_string_lossy().to_string()
}
