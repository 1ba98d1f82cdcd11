// ==========================================
// 农场区块生命周期 - 引擎层错误类型
// ==========================================
// 红线: 业务规则违反必须以类型化错误返回,不得静默修正
// ==========================================

use crate::domain::types::BlockState;
use thiserror::Error;

/// 引擎层 (纯规则) 错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidTransition { from: BlockState, to: BlockState },

    #[error("种植数量超出容量: requested={requested}, max={max}")]
    CapacityExceeded { requested: i32, max: i32 },

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("当前状态不允许该操作: state={state}, {reason}")]
    InvalidState { state: BlockState, reason: String },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
