// ==========================================
// 农场区块生命周期 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod alert;
pub mod archive;
pub mod block;
pub mod plant;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use alert::{Alert, AlertsSummary};
pub use archive::{ArchivePage, BlockArchive};
pub use block::{
    Block, BlockCalculated, BlockKpi, QualityBreakdown, StatusChange, TransitionPayload,
};
pub use plant::PlantGrowthProfile;
pub use types::{AlertSeverity, BlockState, PerformanceCategory, QualityGrade, UserRole};
