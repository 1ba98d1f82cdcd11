// ==========================================
// 农场区块生命周期 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod alert_repo;
pub mod archive_repo;
pub mod block_repo;
pub mod error;
pub mod plant_repo;
pub mod sql_types;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use alert_repo::AlertRepository;
pub use archive_repo::ArchiveRepository;
pub use block_repo::BlockRepository;
pub use error::{retry_once, RepositoryError, RepositoryResult};
pub use plant_repo::PlantProfileRepository;
