use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Error::NotFound { kind, id }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = Error::not_found("concept", 42);
        assert_eq!(err.to_string(), "concept 42 not found");
    }

    #[test]
    fn invalid_input_message() {
        let err = Error::invalid("grade must be again/hard/good/easy");
        assert_eq!(
            err.to_string(),
            "invalid input: grade must be again/hard/good/easy"
        );
    }

    #[test]
    fn rusqlite_errors_convert() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
