use super::error::{ForecastError, ForecastResult};
use super::grid::{LedgerGrid, RatioTable};
use super::types::{
    BoundaryPolicy, FORECAST_HORIZON_YEARS, ForecastPoint, LedgerPoint, MAX_YEAR, MIN_YEAR,
    RatioPoint,
};

#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub points: Vec<ForecastPoint>,
    /// The ledger after every draw made by the run.
    pub ledger: Vec<LedgerPoint>,
}

/// Runs the cascade over a validated grid. The grid is consumed: its balances
/// are drawn down as the forecast years are computed and handed back in
/// [`ForecastRun::ledger`].
pub fn run_forecast_engine(
    grid: LedgerGrid,
    ratios: &RatioTable,
    current_year: i32,
    boundary: BoundaryPolicy,
) -> ForecastResult<ForecastRun> {
    let current_year_index = grid.year_block_start(current_year)?;
    grid.ensure_covers(current_year.saturating_add(FORECAST_HORIZON_YEARS as i32 - 1))?;
    let entity_count = grid.entity_count();

    log::debug!(
        "engine: {entity_count} entities, {} ratios, {}..={}, current {current_year}, {boundary:?}",
        ratios.len(),
        grid.baseline_year(),
        grid.last_year()
    );

    allocate(
        grid.into_points(),
        ratios.as_slice(),
        entity_count,
        current_year_index,
        current_year,
        boundary,
    )
}

/// Cascading depletion over a year-major ledger.
///
/// For each forecast year (ascending) and each entity, walks back one year
/// block per ratio offset, drawing `ratio * remaining` from every reachable
/// cell. Draws are written back immediately, so a later forecast year only
/// sees what earlier years left behind.
pub fn allocate(
    mut ledger: Vec<LedgerPoint>,
    ratios: &[RatioPoint],
    entity_count: usize,
    current_year_index: usize,
    current_year: i32,
    boundary: BoundaryPolicy,
) -> ForecastResult<ForecastRun> {
    if entity_count == 0 {
        return Err(ForecastError::EmptyEntitySet);
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&current_year)
        || current_year_index % entity_count != 0
        || ledger.get(current_year_index).map(|p| p.year) != Some(current_year)
    {
        return Err(ForecastError::CurrentYearNotFound { year: current_year });
    }
    let horizon_end = current_year_index + FORECAST_HORIZON_YEARS * entity_count;
    if horizon_end > ledger.len() {
        return Err(ForecastError::MalformedLedger(format!(
            "{} rows cannot hold {FORECAST_HORIZON_YEARS} years of {entity_count} entities from {}",
            ledger.len(),
            current_year_index
        )));
    }

    let mut points = Vec::with_capacity(FORECAST_HORIZON_YEARS * entity_count);
    for year_offset in 0..FORECAST_HORIZON_YEARS {
        let year = current_year + year_offset as i32;
        for entity_ordinal in 0..entity_count {
            let target_index = current_year_index + entity_ordinal + year_offset * entity_count;
            let mut accumulated = 0.0;

            for (i, ratio) in ratios.iter().enumerate() {
                let Some(source_index) = target_index.checked_sub(i * entity_count) else {
                    break;
                };
                if !boundary.admits(source_index) {
                    break;
                }
                let source = &mut ledger[source_index];
                let contribution = ratio.ratio * source.remaining;
                accumulated += contribution;
                source.remaining -= contribution;
            }

            points.push(ForecastPoint {
                year,
                entity_id: ledger[target_index].entity_id,
                amount: accumulated,
            });
        }
    }

    Ok(ForecastRun { points, ledger })
}
