use ulid::Ulid;

use super::ValidationResult;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    Rejected(ValidationResult),
    InvalidSnapshot(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Rejected(result) => {
                write!(f, "booking rejected: {}", result.messages().join(" "))
            }
            EngineError::InvalidSnapshot(e) => write!(f, "invalid snapshot: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
