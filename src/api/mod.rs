// ==========================================
// 农场区块生命周期 - API 层
// ==========================================
// 职责: 提供业务用例接口,供展示层调用
// ==========================================

pub mod alert_api;
pub mod archive_api;
pub mod block_api;
pub mod dashboard_api;
pub mod error;

use chrono::{NaiveDateTime, Timelike};

use crate::domain::types::UserRole;
use crate::engine::AdminCapability;

// 重导出核心类型
pub use alert_api::{AlertApi, AlertWriteResponse, RaiseAlertRequest, ResolveAlertRequest};
pub use archive_api::ArchiveApi;
pub use block_api::{BlockApi, ProvisionBlockRequest, RecordHarvestRequest, TransitionBlockRequest};
pub use dashboard_api::{DashboardApi, DashboardSubscription};
pub use error::{ApiError, ApiResult};

/// 当前本地时间（截断到秒，与存储精度一致）
pub(crate) fn now_ts() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// 申请管理员凭证
///
/// # 错误
/// - `Forbidden`: 角色不是 admin
pub fn require_admin(role: UserRole, actor: &str) -> ApiResult<AdminCapability> {
    AdminCapability::grant(role, actor).ok_or_else(|| {
        ApiError::Forbidden(format!("该操作需要管理员权限: role={}, actor={}", role, actor))
    })
}
