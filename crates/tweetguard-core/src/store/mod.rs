pub mod db;
mod queues;
mod reported;
mod rules;
mod unreported;

pub use db::Database;
pub(crate) use rules::normalize_term;

use crate::models::InvalidKey;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{set} has no record for {key}")]
    NotFound { set: &'static str, key: String },

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),
}

impl StoreError {
    pub(crate) fn not_found(set: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            set,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
