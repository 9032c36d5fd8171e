use serde::{Deserialize, Serialize};

pub const FORECAST_HORIZON_YEARS: usize = 5;

/// Oldest and newest budget years a ledger may reference.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2999;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Action,
    Operation,
}

impl EntityKind {
    /// Result-set name the surrounding web layer keys the forecast rows under.
    pub fn result_set_name(self) -> &'static str {
        match self {
            EntityKind::Action => "DifActionPmtPrevision",
            EntityKind::Operation => "DifOpPmtPrevision",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Action => "action",
            EntityKind::Operation => "operation",
        }
    }
}

/// Which ledger cells the cascade may draw from when walking back in time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Every cell from index 0 onwards is readable, so the baseline year
    /// contributes for all entities.
    #[default]
    Inclusive,
    /// Index 0 (baseline year, first entity) is never read.
    ExcludeOrigin,
}

impl BoundaryPolicy {
    pub fn admits(self, source_index: usize) -> bool {
        match self {
            BoundaryPolicy::Inclusive => true,
            BoundaryPolicy::ExcludeOrigin => source_index > 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MissingEntityPolicy {
    #[default]
    Fail,
    LeaveUnenriched,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPoint {
    pub year: i32,
    #[serde(alias = "entity_id")]
    pub entity_id: i64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioPoint {
    pub offset: u32,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub year: i32,
    pub entity_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    #[serde(alias = "entity_id")]
    pub entity_id: i64,
    pub code: String,
    pub name: String,
    #[serde(default, alias = "parent_code")]
    pub parent_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedForecastPoint {
    pub year: i32,
    pub entity_id: i64,
    pub amount: f64,
    pub code: Option<String>,
    pub name: Option<String>,
    pub parent_code: Option<String>,
}

impl EnrichedForecastPoint {
    pub fn is_enriched(&self) -> bool {
        self.code.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTotal {
    pub year: i32,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastConfig {
    pub current_year: i32,
    pub boundary: BoundaryPolicy,
    pub missing_entity: MissingEntityPolicy,
}

impl ForecastConfig {
    pub fn for_year(current_year: i32) -> Self {
        Self {
            current_year,
            boundary: BoundaryPolicy::default(),
            missing_entity: MissingEntityPolicy::default(),
        }
    }

    pub fn last_forecast_year(&self) -> i32 {
        self.current_year.saturating_add(FORECAST_HORIZON_YEARS as i32 - 1)
    }
}
