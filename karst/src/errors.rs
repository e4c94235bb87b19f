use std::fmt;

use limestone::DbError;

/// Errors surfaced by operators.
#[derive(Debug)]
pub enum ExecError {
    /// A storage-layer failure, including `TransactionAborted` from a
    /// deadlock verdict; the caller must stop the transaction's work.
    Db(DbError),
    /// The operator was pulled before `open` or after `close`.
    Closed,
    /// The aggregate is not defined for the field's type.
    IllegalAggregate(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Db(e) => write!(f, "storage error: {}", e),
            ExecError::Closed => write!(f, "operator is not open"),
            ExecError::IllegalAggregate(msg) => write!(f, "illegal aggregate: {}", msg),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for ExecError {
    fn from(err: DbError) -> Self {
        ExecError::Db(err)
    }
}
