// ==========================================
// 农场区块生命周期 - 应用层
// ==========================================
// 职责: 装配仓储与API, 供展示层/二进制入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
