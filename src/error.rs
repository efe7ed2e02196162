use thiserror::Error;

pub type RosterResult<T> = Result<T, RosterError>;

/// Failures that reach a caller of the roster library.
///
/// Per-cell coercion misses and rows without identity never show up here;
/// they are absorbed during ingestion and only counted in the ingest report.
#[derive(Error, Debug)]
pub enum RosterError {
    /// The sheet could not be downloaded (transport failure or non-success status).
    #[error("roster source unavailable after {attempts} attempt(s): {reason}")]
    SourceUnavailable { attempts: u32, reason: String },

    /// The downloaded document is not readable CSV.
    #[error("malformed roster document: {0}")]
    MalformedDocument(String),

    #[error("found {found} record(s), but at least {required} are required")]
    InsufficientRecords { found: usize, required: usize },

    #[error("no export fields selected")]
    NoFieldsSelected,

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("annotation store holds an unreadable value: {0}")]
    CorruptAnnotation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RosterError {
    /// True for the two failures a dashboard surfaces as "data unavailable, please retry".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RosterError::SourceUnavailable { .. } | RosterError::MalformedDocument(_)
        )
    }
}

impl From<csv::Error> for RosterError {
    fn from(err: csv::Error) -> Self {
        RosterError::MalformedDocument(err.to_string())
    }
}
