#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("Dedup database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid dedup table name: {0:?}")]
    InvalidTable(String),

    #[error("Retention window out of range: {0:?}")]
    InvalidRetention(std::time::Duration),
}
