//! One forecast request end to end: query the providers once, validate their
//! output against the grid contracts, run the engine on a private copy of
//! the ledger and join catalog metadata onto the result.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::engine::run_forecast_engine;
use super::error::{ForecastError, ForecastResult};
use super::grid::{LedgerGrid, RatioTable};
use super::joiner::join_entity_meta;
use super::types::{
    EnrichedForecastPoint, EntityKind, EntityMeta, ForecastConfig, ForecastPoint, LedgerPoint,
    RatioPoint, YearTotal,
};

/// Remaining-to-be-mandated balances, year-major, covering the baseline year
/// through `current_year + 4`.
pub trait LedgerProvider {
    fn ledger(&self, kind: EntityKind, current_year: i32) -> ForecastResult<Vec<LedgerPoint>>;
}

/// Average payment ratios by offset, ascending from offset 0.
pub trait RatioProvider {
    fn ratios(&self, kind: EntityKind) -> ForecastResult<Vec<RatioPoint>>;
}

pub trait EntityCatalog {
    fn entities(&self, kind: EntityKind) -> ForecastResult<Vec<EntityMeta>>;
}

#[derive(Copy, Clone)]
pub struct ForecastSources<'a> {
    pub ledger: &'a dyn LedgerProvider,
    pub ratios: &'a dyn RatioProvider,
    pub catalog: &'a dyn EntityCatalog,
}

impl<'a> ForecastSources<'a> {
    pub fn from_single<P>(provider: &'a P) -> Self
    where
        P: LedgerProvider + RatioProvider + EntityCatalog,
    {
        Self {
            ledger: provider,
            ratios: provider,
            catalog: provider,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub kind: EntityKind,
    pub current_year: i32,
    pub rows: Vec<EnrichedForecastPoint>,
    pub yearly_totals: Vec<YearTotal>,
}

impl ForecastReport {
    /// `{"<result set name>": [rows...]}` as the web layer emits it.
    pub fn to_envelope(&self) -> ForecastResult<Value> {
        let mut envelope = Map::new();
        envelope.insert(
            self.kind.result_set_name().to_string(),
            serde_json::to_value(&self.rows)?,
        );
        Ok(Value::Object(envelope))
    }

    pub fn total(&self) -> f64 {
        self.yearly_totals.iter().map(|t| t.amount).sum()
    }
}

pub fn run_forecast(
    kind: EntityKind,
    sources: ForecastSources<'_>,
    config: &ForecastConfig,
) -> ForecastResult<ForecastReport> {
    let ledger = sources.ledger.ledger(kind, config.current_year)?;
    let ratios = sources.ratios.ratios(kind)?;

    let grid = LedgerGrid::new(ledger)?;
    let table = RatioTable::new(ratios)?;
    let entity_count = grid.entity_count();
    log::debug!("{} ledger: {} rows", kind.label(), grid.len());

    let run = run_forecast_engine(grid, &table, config.current_year, config.boundary)?;

    let catalog = sources.catalog.entities(kind)?;
    let rows = join_entity_meta(&run.points, catalog, config.missing_entity)?;
    let yearly_totals = yearly_totals(&run.points);

    log::info!(
        "{} forecast {}..={}: {entity_count} entities, {} ratio offsets, total {:.2}",
        kind.label(),
        config.current_year,
        config.last_forecast_year(),
        table.len(),
        yearly_totals.iter().map(|t| t.amount).sum::<f64>()
    );
    log::debug!("{} ratio table sums to {:.4}", kind.label(), table.total());

    Ok(ForecastReport {
        kind,
        current_year: config.current_year,
        rows,
        yearly_totals,
    })
}

pub fn yearly_totals(points: &[ForecastPoint]) -> Vec<YearTotal> {
    let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
    for point in points {
        *by_year.entry(point.year).or_insert(0.0) += point.amount;
    }
    by_year
        .into_iter()
        .map(|(year, amount)| YearTotal { year, amount })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindDataset {
    #[serde(default)]
    pub ledger: Vec<LedgerPoint>,
    #[serde(default)]
    pub ratios: Vec<RatioPoint>,
    #[serde(default)]
    pub catalog: Vec<EntityMeta>,
}

/// In-memory provider backed by a JSON document holding one section per
/// entity kind. Ledger rows may be sparse; they are densified over
/// `[earliest year, current_year + 4]` when queried.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastDataset {
    #[serde(default, alias = "action")]
    pub actions: Option<KindDataset>,
    #[serde(default, alias = "operation", alias = "ops")]
    pub operations: Option<KindDataset>,
}

impl ForecastDataset {
    pub fn from_json(json: &str) -> ForecastResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn section(&self, kind: EntityKind) -> ForecastResult<&KindDataset> {
        let section = match kind {
            EntityKind::Action => self.actions.as_ref(),
            EntityKind::Operation => self.operations.as_ref(),
        };
        section.ok_or_else(|| ForecastError::Provider {
            provider: "dataset",
            message: format!("no {} section in dataset", kind.label()),
        })
    }
}

impl LedgerProvider for ForecastDataset {
    fn ledger(&self, kind: EntityKind, current_year: i32) -> ForecastResult<Vec<LedgerPoint>> {
        let section = self.section(kind)?;
        let last_year = ForecastConfig::for_year(current_year).last_forecast_year();
        let in_horizon: Vec<LedgerPoint> = section
            .ledger
            .iter()
            .filter(|p| p.year <= last_year)
            .copied()
            .collect();
        let dropped = section.ledger.len() - in_horizon.len();
        if dropped > 0 {
            log::debug!("dataset: ignoring {dropped} {} rows after {last_year}", kind.label());
        }

        let baseline_year = in_horizon
            .iter()
            .map(|p| p.year)
            .min()
            .unwrap_or(current_year)
            .min(current_year);
        Ok(LedgerGrid::densify(&in_horizon, baseline_year, last_year)?.into_points())
    }
}

impl RatioProvider for ForecastDataset {
    fn ratios(&self, kind: EntityKind) -> ForecastResult<Vec<RatioPoint>> {
        let mut ratios = self.section(kind)?.ratios.clone();
        ratios.sort_by_key(|r| r.offset);
        Ok(ratios)
    }
}

impl EntityCatalog for ForecastDataset {
    fn entities(&self, kind: EntityKind) -> ForecastResult<Vec<EntityMeta>> {
        Ok(self.section(kind)?.catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BoundaryPolicy, MissingEntityPolicy};
    use std::cell::Cell;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    const DATASET_JSON: &str = r#"{
        "actions": {
            "ledger": [
                {"year": 2020, "entityId": 1, "remaining": 1000},
                {"year": 2021, "entityId": 1, "remaining": 800},
                {"year": 2022, "entityId": 1, "remaining": 600},
                {"year": 2023, "entityId": 1, "remaining": 500},
                {"year": 2023, "entity_id": 2, "remaining": 100},
                {"year": 2031, "entityId": 2, "remaining": 999}
            ],
            "ratios": [
                {"offset": 1, "ratio": 0.3},
                {"offset": 0, "ratio": 0.5},
                {"offset": 2, "ratio": 0.2}
            ],
            "catalog": [
                {"entityId": 2, "code": "A-02", "name": "Schools", "parentCode": "P-1"},
                {"entityId": 1, "code": "A-01", "name": "Roads"}
            ]
        }
    }"#;

    #[test]
    fn dataset_forecast_matches_cascade_and_joins_catalog() {
        let dataset = ForecastDataset::from_json(DATASET_JSON).expect("dataset parses");
        let report = run_forecast(
            EntityKind::Action,
            ForecastSources::from_single(&dataset),
            &ForecastConfig::for_year(2023),
        )
        .expect("forecast");

        assert_eq!(report.rows.len(), 10);
        let roads_2023 = &report.rows[0];
        assert_eq!(roads_2023.entity_id, 1);
        assert_eq!(roads_2023.code.as_deref(), Some("A-01"));
        assert_approx(roads_2023.amount, 590.0);

        let schools_2023 = &report.rows[1];
        assert_eq!(schools_2023.name.as_deref(), Some("Schools"));
        assert_eq!(schools_2023.parent_code.as_deref(), Some("P-1"));
        assert_approx(schools_2023.amount, 50.0);

        assert_eq!(report.yearly_totals.len(), 5);
        assert_eq!(report.yearly_totals[0].year, 2023);
        assert_approx(report.yearly_totals[0].amount, 640.0);
        // 2024: roads 159, schools 0.3*50 = 15
        assert_approx(report.yearly_totals[1].amount, 174.0);
    }

    #[test]
    fn envelope_is_keyed_by_result_set_name() {
        let dataset = ForecastDataset::from_json(DATASET_JSON).expect("dataset parses");
        let report = run_forecast(
            EntityKind::Action,
            ForecastSources::from_single(&dataset),
            &ForecastConfig::for_year(2023),
        )
        .expect("forecast");

        let envelope = report.to_envelope().expect("serializes");
        let rows = envelope["DifActionPmtPrevision"]
            .as_array()
            .expect("array of rows");
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0]["entityId"], 1);
        assert_eq!(rows[0]["code"], "A-01");
        assert!(rows[0].get("parentCode").is_some());
    }

    #[test]
    fn missing_section_is_a_provider_failure() {
        let dataset = ForecastDataset::from_json(DATASET_JSON).expect("dataset parses");
        let err = run_forecast(
            EntityKind::Operation,
            ForecastSources::from_single(&dataset),
            &ForecastConfig::for_year(2023),
        )
        .expect_err("no operations section");
        assert!(matches!(err, ForecastError::Provider { .. }));
    }

    #[test]
    fn missing_catalog_entry_follows_policy() {
        let mut dataset = ForecastDataset::from_json(DATASET_JSON).expect("dataset parses");
        if let Some(actions) = dataset.actions.as_mut() {
            actions.catalog.retain(|m| m.entity_id != 2);
        }

        let strict = ForecastConfig::for_year(2023);
        let err = run_forecast(EntityKind::Action, ForecastSources::from_single(&dataset), &strict)
            .expect_err("entity 2 missing");
        assert!(matches!(err, ForecastError::EntityNotFound { entity_id: 2 }));

        let lenient = ForecastConfig {
            missing_entity: MissingEntityPolicy::LeaveUnenriched,
            ..strict
        };
        let report = run_forecast(
            EntityKind::Action,
            ForecastSources::from_single(&dataset),
            &lenient,
        )
        .expect("lenient forecast");
        let unenriched: Vec<_> = report.rows.iter().filter(|r| !r.is_enriched()).collect();
        assert_eq!(unenriched.len(), 5);
        assert!(unenriched.iter().all(|r| r.entity_id == 2));
    }

    #[test]
    fn empty_ledger_section_reports_empty_entity_set() {
        let dataset = ForecastDataset::from_json(
            r#"{"operations": {"ratios": [{"offset": 0, "ratio": 1.0}]}}"#,
        )
        .expect("dataset parses");
        let err = run_forecast(
            EntityKind::Operation,
            ForecastSources::from_single(&dataset),
            &ForecastConfig::for_year(2023),
        )
        .expect_err("no ledger rows");
        assert!(matches!(err, ForecastError::EmptyEntitySet));
    }

    #[test]
    fn out_of_range_ledger_year_is_malformed() {
        let dataset = ForecastDataset::from_json(
            r#"{"actions": {
                "ledger": [{"year": -2147483000, "entityId": 1, "remaining": 1}],
                "ratios": [{"offset": 0, "ratio": 0.5}],
                "catalog": []
            }}"#,
        )
        .expect("dataset parses");
        let err = run_forecast(
            EntityKind::Action,
            ForecastSources::from_single(&dataset),
            &ForecastConfig::for_year(2023),
        )
        .expect_err("year far before the supported range");
        assert!(matches!(err, ForecastError::MalformedLedger(_)));
    }

    struct CountingSource {
        ledger_calls: Cell<u32>,
        ratio_calls: Cell<u32>,
        points: Vec<LedgerPoint>,
    }

    impl LedgerProvider for CountingSource {
        fn ledger(
            &self,
            _kind: EntityKind,
            _current_year: i32,
        ) -> ForecastResult<Vec<LedgerPoint>> {
            self.ledger_calls.set(self.ledger_calls.get() + 1);
            Ok(self.points.clone())
        }
    }

    impl RatioProvider for CountingSource {
        fn ratios(&self, _kind: EntityKind) -> ForecastResult<Vec<RatioPoint>> {
            self.ratio_calls.set(self.ratio_calls.get() + 1);
            Ok(vec![
                RatioPoint {
                    offset: 0,
                    ratio: 0.0,
                },
                RatioPoint {
                    offset: 1,
                    ratio: 0.5,
                },
            ])
        }
    }

    impl EntityCatalog for CountingSource {
        fn entities(&self, _kind: EntityKind) -> ForecastResult<Vec<EntityMeta>> {
            Ok(vec![EntityMeta {
                entity_id: 7,
                code: "OP-7".to_string(),
                name: "Bridge".to_string(),
                parent_code: None,
            }])
        }
    }

    fn counting_source() -> CountingSource {
        let points = (2022..=2027)
            .map(|year| LedgerPoint {
                year,
                entity_id: 7,
                remaining: if year == 2022 { 100.0 } else { 0.0 },
            })
            .collect();
        CountingSource {
            ledger_calls: Cell::new(0),
            ratio_calls: Cell::new(0),
            points,
        }
    }

    #[test]
    fn providers_are_queried_once_and_boundary_is_honoured() {
        let source = counting_source();
        let inclusive = ForecastConfig::for_year(2023);
        let report = run_forecast(
            EntityKind::Operation,
            ForecastSources::from_single(&source),
            &inclusive,
        )
        .expect("forecast");
        assert_eq!(source.ledger_calls.get(), 1);
        assert_eq!(source.ratio_calls.get(), 1);
        assert_approx(report.rows[0].amount, 50.0);
        assert_approx(report.total(), 50.0);

        let exclusive = ForecastConfig {
            boundary: BoundaryPolicy::ExcludeOrigin,
            ..inclusive
        };
        let report = run_forecast(
            EntityKind::Operation,
            ForecastSources::from_single(&source),
            &exclusive,
        )
        .expect("forecast");
        assert_approx(report.total(), 0.0);
    }

    #[test]
    fn unordered_provider_rows_are_rejected() {
        let mut source = counting_source();
        source.points.swap(0, 1);
        let err = run_forecast(
            EntityKind::Operation,
            ForecastSources::from_single(&source),
            &ForecastConfig::for_year(2023),
        )
        .expect_err("years out of order");
        assert!(matches!(err, ForecastError::MalformedLedger(_)));
    }

    #[test]
    fn yearly_totals_sum_entities_per_year() {
        let totals = yearly_totals(&[
            ForecastPoint {
                year: 2024,
                entity_id: 1,
                amount: 2.0,
            },
            ForecastPoint {
                year: 2023,
                entity_id: 1,
                amount: 1.0,
            },
            ForecastPoint {
                year: 2024,
                entity_id: 2,
                amount: 3.0,
            },
        ]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].year, 2023);
        assert_approx(totals[1].amount, 5.0);
    }
}
