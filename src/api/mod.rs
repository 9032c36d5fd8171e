use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::core::{
    BoundaryPolicy, EntityKind, ForecastConfig, ForecastDataset, ForecastReport, ForecastSources,
    MAX_YEAR, MIN_YEAR, MissingEntityPolicy, YearTotal, run_forecast,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliEntityKind {
    Action,
    Operation,
}

impl From<CliEntityKind> for EntityKind {
    fn from(value: CliEntityKind) -> Self {
        match value {
            CliEntityKind::Action => EntityKind::Action,
            CliEntityKind::Operation => EntityKind::Operation,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliBoundaryPolicy {
    Inclusive,
    ExcludeOrigin,
}

impl From<CliBoundaryPolicy> for BoundaryPolicy {
    fn from(value: CliBoundaryPolicy) -> Self {
        match value {
            CliBoundaryPolicy::Inclusive => BoundaryPolicy::Inclusive,
            CliBoundaryPolicy::ExcludeOrigin => BoundaryPolicy::ExcludeOrigin,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliMissingEntityPolicy {
    Fail,
    LeaveUnenriched,
}

impl From<CliMissingEntityPolicy> for MissingEntityPolicy {
    fn from(value: CliMissingEntityPolicy) -> Self {
        match value {
            CliMissingEntityPolicy::Fail => MissingEntityPolicy::Fail,
            CliMissingEntityPolicy::LeaveUnenriched => MissingEntityPolicy::LeaveUnenriched,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiEntityKind {
    #[serde(alias = "actions")]
    Action,
    #[serde(alias = "operations", alias = "op")]
    Operation,
}

impl From<ApiEntityKind> for CliEntityKind {
    fn from(value: ApiEntityKind) -> Self {
        match value {
            ApiEntityKind::Action => CliEntityKind::Action,
            ApiEntityKind::Operation => CliEntityKind::Operation,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiBoundaryPolicy {
    Inclusive,
    #[serde(alias = "excludeOrigin", alias = "exclude_origin", alias = "exclusive")]
    ExcludeOrigin,
}

impl From<ApiBoundaryPolicy> for CliBoundaryPolicy {
    fn from(value: ApiBoundaryPolicy) -> Self {
        match value {
            ApiBoundaryPolicy::Inclusive => CliBoundaryPolicy::Inclusive,
            ApiBoundaryPolicy::ExcludeOrigin => CliBoundaryPolicy::ExcludeOrigin,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMissingEntityPolicy {
    Fail,
    #[serde(alias = "leaveUnenriched", alias = "leave_unenriched", alias = "partial")]
    LeaveUnenriched,
}

impl From<ApiMissingEntityPolicy> for CliMissingEntityPolicy {
    fn from(value: ApiMissingEntityPolicy) -> Self {
        match value {
            ApiMissingEntityPolicy::Fail => CliMissingEntityPolicy::Fail,
            ApiMissingEntityPolicy::LeaveUnenriched => CliMissingEntityPolicy::LeaveUnenriched,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RequestOptions {
    kind: Option<ApiEntityKind>,
    #[serde(alias = "current_year")]
    current_year: Option<i32>,
    boundary: Option<ApiBoundaryPolicy>,
    #[serde(alias = "missing_entity")]
    missing_entity: Option<ApiMissingEntityPolicy>,
}

/// Input document: optional `options` plus the per-kind dataset sections.
#[derive(Debug, Default, Deserialize)]
struct ForecastPayload {
    #[serde(default)]
    options: RequestOptions,
    #[serde(flatten)]
    dataset: ForecastDataset,
}

#[derive(Parser, Debug)]
#[command(
    name = "ram-forecast",
    about = "Five-year payment forecast from remaining balances and observed payment ratios"
)]
pub struct Cli {
    #[arg(long, help = "JSON document with ledger, ratios and catalog per entity kind")]
    pub input: PathBuf,
    #[arg(long, value_enum, help = "Entity dimension; overrides options.kind, defaults to action")]
    pub kind: Option<CliEntityKind>,
    #[arg(long, help = "First forecast year; overrides options.currentYear")]
    pub current_year: Option<i32>,
    #[arg(
        long,
        value_enum,
        help = "Whether the first ledger cell may be drawn from; defaults to inclusive"
    )]
    pub boundary: Option<CliBoundaryPolicy>,
    #[arg(
        long,
        value_enum,
        help = "What to do when a forecast entity is absent from the catalog; defaults to fail"
    )]
    pub missing_entity: Option<CliMissingEntityPolicy>,
    #[arg(long, help = "Add per-year totals to the output")]
    pub totals: bool,
    #[arg(long, help = "Pretty-print the JSON output")]
    pub pretty: bool,
}

#[derive(Debug)]
struct ApiRequest {
    kind: EntityKind,
    config: ForecastConfig,
    dataset: ForecastDataset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TotalsSection<'a> {
    current_year: i32,
    grand_total: f64,
    yearly_totals: &'a [YearTotal],
}

pub fn run_cli(cli: &Cli) -> Result<String, String> {
    let json = fs::read_to_string(&cli.input)
        .map_err(|e| format!("Cannot read {}: {e}", cli.input.display()))?;
    let request = api_request_from_json(&json, cli)?;
    let report = execute_request(&request)?;
    let response = build_forecast_response(&report, cli.totals)?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    output.map_err(|e| format!("Cannot serialize forecast: {e}"))
}

fn api_request_from_json(json: &str, cli: &Cli) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ForecastPayload>(json)
        .map_err(|e| format!("Invalid forecast JSON document: {e}"))?;
    let options = payload.options;

    let kind = cli
        .kind
        .or(options.kind.map(Into::into))
        .unwrap_or(CliEntityKind::Action);
    let current_year = cli.current_year.or(options.current_year);
    let boundary = cli
        .boundary
        .or(options.boundary.map(Into::into))
        .unwrap_or(CliBoundaryPolicy::Inclusive);
    let missing_entity = cli
        .missing_entity
        .or(options.missing_entity.map(Into::into))
        .unwrap_or(CliMissingEntityPolicy::Fail);

    Ok(ApiRequest {
        kind: kind.into(),
        config: build_config(current_year, boundary, missing_entity)?,
        dataset: payload.dataset,
    })
}

fn build_config(
    current_year: Option<i32>,
    boundary: CliBoundaryPolicy,
    missing_entity: CliMissingEntityPolicy,
) -> Result<ForecastConfig, String> {
    let Some(current_year) = current_year else {
        return Err("--current-year is required (or options.currentYear in the input)".to_string());
    };

    if !(MIN_YEAR..=MAX_YEAR).contains(&current_year) {
        return Err(format!(
            "--current-year must be between {MIN_YEAR} and {MAX_YEAR}"
        ));
    }

    Ok(ForecastConfig {
        current_year,
        boundary: boundary.into(),
        missing_entity: missing_entity.into(),
    })
}

fn execute_request(request: &ApiRequest) -> Result<ForecastReport, String> {
    run_forecast(
        request.kind,
        ForecastSources::from_single(&request.dataset),
        &request.config,
    )
    .map_err(|e| e.to_string())
}

fn build_forecast_response(report: &ForecastReport, with_totals: bool) -> Result<Value, String> {
    let mut response = report.to_envelope().map_err(|e| e.to_string())?;
    if with_totals {
        let totals = TotalsSection {
            current_year: report.current_year,
            grand_total: report.total(),
            yearly_totals: &report.yearly_totals,
        };
        let totals = serde_json::to_value(totals).map_err(|e| e.to_string())?;
        if let Value::Object(map) = &mut response {
            map.insert("totals".to_string(), totals);
        }
    }
    Ok(response)
}
