// ==========================================
// 农场区块生命周期 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Repository / Engine 错误为调用方可识别的分类
// 分类: ValidationError / InvalidTransition / CapacityExceeded / InvalidState
//       NotFound / Forbidden / Conflict
// ==========================================

use crate::domain::types::BlockState;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有业务规则违反立即以类型化错误返回，不做静默修正
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidTransition { from: BlockState, to: BlockState },

    #[error("种植数量超出容量: requested={requested}, max={max}")]
    CapacityExceeded { requested: i32, max: i32 },

    #[error("当前状态不允许该操作: state={state}, {reason}")]
    InvalidState { state: BlockState, reason: String },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("权限不足: {0}")]
    Forbidden(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误码（供前端/调用方分支）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ApiError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ApiError::InvalidState { .. } => "INVALID_STATE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DatabaseError(_) | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "{}(id={})已被其他请求修改（期望revision={}，实际revision={}）",
                entity, id, expected, actual
            )),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseBusy(msg) => {
                ApiError::DatabaseError(format!("数据库忙: {}", msg))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换 (一一对应)
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition { from, to } => ApiError::InvalidTransition { from, to },
            EngineError::CapacityExceeded { requested, max } => {
                ApiError::CapacityExceeded { requested, max }
            }
            EngineError::ValidationError(msg) => ApiError::ValidationError(msg),
            EngineError::InvalidState { state, reason } => ApiError::InvalidState { state, reason },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
