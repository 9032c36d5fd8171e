use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::error::{ForecastError, ForecastResult};
use super::types::{EnrichedForecastPoint, EntityMeta, ForecastPoint, MissingEntityPolicy};

/// Catalog indexed by entity id. Built once per request; input order does
/// not matter.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    by_id: HashMap<i64, EntityMeta>,
}

impl CatalogIndex {
    pub fn build(catalog: Vec<EntityMeta>) -> ForecastResult<Self> {
        let mut by_id = HashMap::with_capacity(catalog.len());
        for meta in catalog {
            match by_id.entry(meta.entity_id) {
                Entry::Occupied(_) => {
                    return Err(ForecastError::DuplicateCatalogEntry {
                        entity_id: meta.entity_id,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(meta);
                }
            }
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, entity_id: i64) -> Option<&EntityMeta> {
        self.by_id.get(&entity_id)
    }
}

pub fn join_entity_meta(
    forecast: &[ForecastPoint],
    catalog: Vec<EntityMeta>,
    policy: MissingEntityPolicy,
) -> ForecastResult<Vec<EnrichedForecastPoint>> {
    log::debug!(
        "joining {} forecast rows against {} catalog entries",
        forecast.len(),
        catalog.len()
    );
    let index = CatalogIndex::build(catalog)?;
    enrich(forecast, &index, policy)
}

pub fn enrich(
    forecast: &[ForecastPoint],
    index: &CatalogIndex,
    policy: MissingEntityPolicy,
) -> ForecastResult<Vec<EnrichedForecastPoint>> {
    let mut rows = Vec::with_capacity(forecast.len());
    let mut unenriched = 0usize;

    for point in forecast {
        let row = match (index.get(point.entity_id), policy) {
            (Some(meta), _) => EnrichedForecastPoint {
                year: point.year,
                entity_id: point.entity_id,
                amount: point.amount,
                code: Some(meta.code.clone()),
                name: Some(meta.name.clone()),
                parent_code: meta.parent_code.clone(),
            },
            (None, MissingEntityPolicy::Fail) => {
                return Err(ForecastError::EntityNotFound {
                    entity_id: point.entity_id,
                });
            }
            (None, MissingEntityPolicy::LeaveUnenriched) => {
                unenriched += 1;
                EnrichedForecastPoint {
                    year: point.year,
                    entity_id: point.entity_id,
                    amount: point.amount,
                    code: None,
                    name: None,
                    parent_code: None,
                }
            }
        };
        rows.push(row);
    }

    if unenriched > 0 {
        log::warn!(
            "{unenriched} of {} forecast rows reference entities missing from the catalog",
            forecast.len()
        );
    }
    Ok(rows)
}
