use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A caller-supplied value violates a stated constraint.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    /// The backing store itself failed.
    #[error("repository failure: {0}")]
    Repository(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        CoreError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// IPC error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "bad_params",
            CoreError::NotFound { .. } => "not_found",
            CoreError::Repository(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::Validation { details, .. } => details.clone(),
            CoreError::NotFound { entity, id } => {
                Some(serde_json::json!({ "entity": entity, "id": id }))
            }
            CoreError::Repository(_) => None,
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                CoreError::validation(format!("duplicate record: {}", e))
            }
            _ => CoreError::Repository(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::validation(e.to_string())
    }
}
