use thiserror::Error;

/// Error types for harvest records and fan-in joins.
#[derive(Error, Debug)]
pub enum AppError {
    /// A record type declares the same field twice (or an empty name).
    #[error("Schema conflict in '{schema}': field '{field}'")]
    SchemaConflict { schema: String, field: String },

    /// Write to a key outside a store's allowed set.
    #[error("{0} is not allowed as key")]
    KeyNotAllowed(String),

    /// Mapping-style access to a name the schema does not declare.
    #[error("Field not declared: {0}")]
    FieldNotDeclared(String),

    /// A field received both a positional and a named value.
    #[error("Multiple values for field '{0}'")]
    DuplicateFieldAssignment(String),

    /// More positional values than the schema has fields.
    #[error("Too many positional values: schema has {expected} fields, got {got}")]
    TooManyPositional { expected: usize, got: usize },

    /// Extracted data could not be turned into a record.
    #[error("Invalid record data: {0}")]
    InvalidRecordData(String),

    /// A completion arrived after the aggregator already fired.
    #[error("Aggregator already fired")]
    AlreadyFired,

    /// A slot was completed twice before the aggregator fired.
    #[error("Slot {0} already has a result")]
    SlotAlreadySet(usize),

    /// A completion arrived after the aggregator was cancelled.
    #[error("Aggregator was cancelled")]
    Cancelled,

    /// Schema definition could not be resolved or loaded.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Invalid environment configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true for lookup failures that callers treat like a missing key.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            AppError::KeyNotAllowed(_) | AppError::FieldNotDeclared(_)
        )
    }

    /// Returns true if a completion was rejected because its slot or the
    /// whole aggregator no longer accepts results.
    pub fn is_late_completion(&self) -> bool {
        matches!(
            self,
            AppError::AlreadyFired | AppError::SlotAlreadySet(_) | AppError::Cancelled
        )
    }
}
