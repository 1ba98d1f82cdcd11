// ==========================================
// 农场区块生命周期 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 区块种植周期管理 (状态机/时间线/产量/告警/归档/驾驶舱)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AlertSeverity, BlockState, PerformanceCategory, QualityGrade, UserRole};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Alert, AlertsSummary, ArchivePage, Block, BlockArchive,
    BlockCalculated, BlockKpi, PlantGrowthProfile, StatusChange, TransitionPayload,
};

// 引擎
pub use engine::{
    AdminCapability, AlertManager, ArchiveBuilder, BlockStateMachine, DashboardAggregator,
    DashboardSummary, TimelineCalculator, YieldAggregator,
};

// API
pub use api::{AlertApi, ApiError, ApiResult, ArchiveApi, BlockApi, DashboardApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "农场区块生命周期";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
