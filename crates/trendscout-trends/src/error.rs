use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("insight service error: {0}")]
    Insight(String),
}
