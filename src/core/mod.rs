mod engine;
mod error;
mod grid;
mod joiner;
mod service;
mod types;

pub use engine::{ForecastRun, allocate, run_forecast_engine};
pub use error::{ForecastError, ForecastResult};
pub use grid::{LedgerGrid, RatioTable};
pub use joiner::{CatalogIndex, enrich, join_entity_meta};
pub use service::{
    EntityCatalog, ForecastDataset, ForecastReport, ForecastSources, KindDataset, LedgerProvider,
    RatioProvider, run_forecast, yearly_totals,
};
pub use types::{
    BoundaryPolicy, EnrichedForecastPoint, EntityKind, EntityMeta, FORECAST_HORIZON_YEARS,
    ForecastConfig, ForecastPoint, LedgerPoint, MAX_YEAR, MIN_YEAR, MissingEntityPolicy,
    RatioPoint, YearTotal,
};
