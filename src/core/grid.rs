//! Shape contracts for the two upstream inputs of the engine.
//!
//! A [`LedgerGrid`] is a dense, rectangular `(year, entity)` grid: one block
//! per year, contiguous years, and the same entities in the same order inside
//! every block, so that `index(year, entity) = block_start(year) + ordinal`.
//! A [`RatioTable`] lists one ratio per offset, starting at 0 with no gaps.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::error::{ForecastError, ForecastResult};
use super::types::{LedgerPoint, MAX_YEAR, MIN_YEAR, RatioPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerGrid {
    points: Vec<LedgerPoint>,
    entity_count: usize,
    baseline_year: i32,
    last_year: i32,
}

impl LedgerGrid {
    /// Validates rows that are already ordered year by year.
    pub fn new(points: Vec<LedgerPoint>) -> ForecastResult<Self> {
        let entity_count = points
            .iter()
            .map(|p| p.entity_id)
            .collect::<HashSet<_>>()
            .len();
        if entity_count == 0 {
            return Err(ForecastError::EmptyEntitySet);
        }
        if points.len() % entity_count != 0 {
            return Err(ForecastError::MalformedLedger(format!(
                "{} rows is not a multiple of {entity_count} entities",
                points.len()
            )));
        }

        let baseline_year = points[0].year;
        check_year(baseline_year)?;
        let (first_block, _) = points.split_at(entity_count);
        for (block_ordinal, block) in points.chunks_exact(entity_count).enumerate() {
            let expected_year = i32::try_from(block_ordinal)
                .ok()
                .and_then(|ordinal| baseline_year.checked_add(ordinal))
                .ok_or_else(|| {
                    ForecastError::MalformedLedger(format!(
                        "block {block_ordinal} lies beyond the last representable year"
                    ))
                })?;
            check_year(expected_year)?;
            for (ordinal, (point, reference)) in block.iter().zip(first_block).enumerate() {
                if point.year != expected_year {
                    return Err(ForecastError::MalformedLedger(format!(
                        "expected year {expected_year} at block {block_ordinal}, found {}",
                        point.year
                    )));
                }
                if point.entity_id != reference.entity_id {
                    return Err(ForecastError::MalformedLedger(format!(
                        "year {expected_year} lists entity {} at position {ordinal}, expected {}",
                        point.entity_id, reference.entity_id
                    )));
                }
                if !point.remaining.is_finite() {
                    return Err(ForecastError::MalformedLedger(format!(
                        "non-finite balance for entity {} in {expected_year}",
                        point.entity_id
                    )));
                }
            }
        }

        // Every block's year was checked above.
        let last_year = points[points.len() - 1].year;
        Ok(Self {
            points,
            entity_count,
            baseline_year,
            last_year,
        })
    }

    /// Builds a grid over `[baseline_year, last_year]` from possibly sparse
    /// rows. Absent cells become zero, repeated cells are summed, and rows
    /// are ordered by year then entity ascending.
    pub fn densify(
        points: &[LedgerPoint],
        baseline_year: i32,
        last_year: i32,
    ) -> ForecastResult<Self> {
        check_year(baseline_year)?;
        check_year(last_year)?;
        if last_year < baseline_year {
            return Err(ForecastError::MalformedLedger(format!(
                "last year {last_year} precedes baseline {baseline_year}"
            )));
        }

        let entities: BTreeSet<i64> = points.iter().map(|p| p.entity_id).collect();
        if entities.is_empty() {
            return Err(ForecastError::EmptyEntitySet);
        }

        let mut cells: HashMap<(i32, i64), f64> = HashMap::with_capacity(points.len());
        for point in points {
            if !(baseline_year..=last_year).contains(&point.year) {
                return Err(ForecastError::MalformedLedger(format!(
                    "row for entity {} in {} falls outside [{baseline_year}, {last_year}]",
                    point.entity_id, point.year
                )));
            }
            *cells.entry((point.year, point.entity_id)).or_insert(0.0) += point.remaining;
        }

        let years = (last_year - baseline_year) as usize + 1;
        let mut dense = Vec::with_capacity(years * entities.len());
        for year in baseline_year..=last_year {
            for &entity_id in &entities {
                dense.push(LedgerPoint {
                    year,
                    entity_id,
                    remaining: cells.get(&(year, entity_id)).copied().unwrap_or(0.0),
                });
            }
        }

        log::debug!(
            "densified {} ledger rows into {} cells ({} entities, {baseline_year}..={last_year})",
            points.len(),
            dense.len(),
            entities.len()
        );
        Self::new(dense)
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn baseline_year(&self) -> i32 {
        self.baseline_year
    }

    pub fn last_year(&self) -> i32 {
        self.last_year
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[LedgerPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<LedgerPoint> {
        self.points
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.points[..self.entity_count].iter().map(|p| p.entity_id)
    }

    pub fn year_block_start(&self, year: i32) -> ForecastResult<usize> {
        if !(self.baseline_year..=self.last_year).contains(&year) {
            return Err(ForecastError::CurrentYearNotFound { year });
        }
        Ok((year - self.baseline_year) as usize * self.entity_count)
    }

    #[cfg(test)]
    pub fn remaining(&self, year: i32, entity_id: i64) -> Option<f64> {
        let start = self.year_block_start(year).ok()?;
        self.points[start..start + self.entity_count]
            .iter()
            .find(|p| p.entity_id == entity_id)
            .map(|p| p.remaining)
    }

    /// Fails unless the grid reaches `last_year`.
    pub fn ensure_covers(&self, last_year: i32) -> ForecastResult<()> {
        if self.last_year < last_year {
            return Err(ForecastError::MalformedLedger(format!(
                "ledger ends in {} but the forecast horizon needs {last_year}",
                self.last_year
            )));
        }
        Ok(())
    }
}

fn check_year(year: i32) -> ForecastResult<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ForecastError::MalformedLedger(format!(
            "year {year} outside supported range {MIN_YEAR}..={MAX_YEAR}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioTable {
    points: Vec<RatioPoint>,
}

impl RatioTable {
    pub fn new(points: Vec<RatioPoint>) -> ForecastResult<Self> {
        if points.is_empty() {
            return Err(ForecastError::MalformedRatios(
                "ratio table is empty".to_string(),
            ));
        }
        for (expected, point) in points.iter().enumerate() {
            if point.offset as usize != expected {
                return Err(ForecastError::MalformedRatios(format!(
                    "expected offset {expected} at position {expected}, found {}",
                    point.offset
                )));
            }
            if !point.ratio.is_finite() || point.ratio < 0.0 {
                return Err(ForecastError::MalformedRatios(format!(
                    "ratio {} at offset {} must be finite and >= 0",
                    point.ratio, point.offset
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn as_slice(&self) -> &[RatioPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.ratio).sum()
    }
}
