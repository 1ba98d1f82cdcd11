// ==========================================
// 农场区块生命周期 - 引擎层
// ==========================================
// 职责: 实现业务规则 (状态机/时间线/产量/告警/归档/驾驶舱)
// 红线: Engine 不拼 SQL, 规则违反以 EngineError 返回
// ==========================================

pub mod alert_rules;
pub mod archive_builder;
pub mod dashboard;
pub mod error;
pub mod read_model;
pub mod state_machine;
pub mod timeline;
pub mod yield_aggregator;

// 重导出核心引擎
pub use alert_rules::{AlertManager, AlertResolution};
pub use archive_builder::ArchiveBuilder;
pub use dashboard::{DashboardAggregator, DashboardSummary, FarmingYear, SeverityCounts};
pub use error::{EngineError, EngineResult};
pub use read_model::BlockReadModel;
pub use state_machine::{
    AdminCapability, BlockStateMachine, TransitionContext, TransitionOutcome,
};
pub use timeline::{ExpectedTimeline, TimelineCalculator, TimelineMetrics};
pub use yield_aggregator::{HarvestRecord, YieldAggregator};
