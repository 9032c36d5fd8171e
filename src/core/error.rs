use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Ledger holds no entities")]
    EmptyEntitySet,

    #[error("Current year {year} not found in ledger")]
    CurrentYearNotFound { year: i32 },

    #[error("Malformed ledger: {0}")]
    MalformedLedger(String),

    #[error("Malformed ratio table: {0}")]
    MalformedRatios(String),

    #[error("Entity {entity_id} not found in catalog")]
    EntityNotFound { entity_id: i64 },

    #[error("Entity {entity_id} listed more than once in catalog")]
    DuplicateCatalogEntry { entity_id: i64 },

    #[error("{provider} provider failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("Dataset error: {0}")]
    Dataset(#[from] serde_json::Error),
}

pub type ForecastResult<T> = Result<T, ForecastError>;
