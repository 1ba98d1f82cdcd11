// ==========================================
// 农场区块生命周期 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 瞬时错误 (库忙/锁) 允许内部重试一次,其余错误原样上抛
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 并发控制错误 =====
    #[error("乐观锁冲突: {entity} id={id}, expected_revision={expected}, actual_revision={actual}")]
    OptimisticLockFailure {
        entity: String,
        id: String,
        expected: i32,
        actual: i32,
    },

    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据质量错误 =====
    #[error("序列化失败: {0}")]
    SerializationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::DatabaseBusy(_) | RepositoryError::LockError(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                RepositoryError::DatabaseBusy(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 执行存储操作，遇到瞬时错误时重试一次
pub fn retry_once<T, F>(op_name: &str, mut op: F) -> RepositoryResult<T>
where
    F: FnMut() -> RepositoryResult<T>,
{
    match op() {
        Err(e) if e.is_transient() => {
            tracing::warn!(op = op_name, error = %e, "存储瞬时错误，重试一次");
            op()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn busy() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
    }

    #[test]
    fn test_busy_maps_to_transient() {
        let err: RepositoryError = busy().into();
        assert!(matches!(err, RepositoryError::DatabaseBusy(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_unique_violation_mapping() {
        let err: RepositoryError = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: block_archive.block_id".to_string()),
        )
        .into();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_retry_once_retries_only_transient() {
        let calls = Cell::new(0);
        let result: RepositoryResult<i32> = retry_once("test", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(busy().into())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);

        let calls = Cell::new(0);
        let result: RepositoryResult<i32> = retry_once("test", || {
            calls.set(calls.get() + 1);
            Err(RepositoryError::InternalError("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
