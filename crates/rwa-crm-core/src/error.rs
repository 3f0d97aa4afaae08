use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {field} — {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("CRM invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CrmError {
    fn from(e: serde_json::Error) -> Self {
        CrmError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for CrmError {
    fn from(e: toml::de::Error) -> Self {
        CrmError::InvalidConfiguration {
            field: "toml".into(),
            reason: e.to_string(),
        }
    }
}
