//! # Snapshot persistence
//!
//! The export format is
//!
//! ```json
//! {"stateByConfigId": {"<species>": {"generation": 3, "bestFitnessAllTime": 812.5,
//!   "bestWeightsAllTime": {"layers": [...]}, "bestFitnessLastGeneration": 640.0,
//!   "bestWeightsLastGeneration": {"layers": [...]}, "totalTime": 41.2}}}
//! ```
//!
//! Import also accepts the older single-species layout, where the state keys
//! sit at the top level (`bestFitness`/`bestWeights` standing in for the
//! all-time fields) and an optional `configId` names the species.
//!
//! Decoding is field-by-field: a field with the wrong type or an unusable
//! weight structure is skipped and reported, the rest of the state is kept.
//! Only a payload that is not JSON, or not recognizably a snapshot at all,
//! fails the import.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::species::SpeciesId;
use super::state::EvolutionState;
use crate::error::{RaceError, Result, ResultExt};
use crate::network::NetworkWeights;

/// Species id assumed for legacy snapshots that carry none.
pub const LEGACY_DEFAULT_SPECIES: &str = "default";

const STATE_MAP_KEY: &str = "stateByConfigId";
const LEGACY_ID_KEY: &str = "configId";

/// Which snapshot layout an import was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// `{"stateByConfigId": {...}}`.
    PerSpecies,
    /// Flattened single-species keys at the top level.
    Legacy,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::PerSpecies => f.write_str("per-species"),
            SchemaVersion::Legacy => f.write_str("legacy"),
        }
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub schema: SchemaVersion,
    pub species_restored: Vec<SpeciesId>,
    /// `species.field` paths that were present but could not be used.
    pub skipped_fields: Vec<String>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_fields.is_empty()
    }
}

pub fn encode(states: &BTreeMap<SpeciesId, EvolutionState>) -> Result<String> {
    let snapshot = Snapshot {
        state_by_config_id: states,
    };
    serde_json::to_string(&snapshot).context("failed to encode evolution snapshot")
}

#[derive(Serialize)]
struct Snapshot<'a> {
    #[serde(rename = "stateByConfigId")]
    state_by_config_id: &'a BTreeMap<SpeciesId, EvolutionState>,
}

/// Decodes either snapshot layout.
///
/// # Errors
///
/// [`RaceError::Json`] for text that is not JSON, [`RaceError::Import`] for
/// JSON that is neither layout.
pub fn decode(json: &str) -> Result<(BTreeMap<SpeciesId, EvolutionState>, ImportReport)> {
    let root: Value = serde_json::from_str(json)?;
    let root = root
        .as_object()
        .ok_or_else(|| RaceError::Import("snapshot root is not an object".to_string()))?;

    let mut skipped = Vec::new();
    let mut states = BTreeMap::new();

    let schema = if let Some(map) = root.get(STATE_MAP_KEY) {
        let map = map
            .as_object()
            .ok_or_else(|| RaceError::Import(format!("`{STATE_MAP_KEY}` is not an object")))?;
        for (id, value) in map {
            match value.as_object() {
                Some(fields) => {
                    let state = decode_state(fields, id, &mut skipped);
                    states.insert(SpeciesId::from(id.as_str()), state);
                }
                None => skipped.push(id.clone()),
            }
        }
        SchemaVersion::PerSpecies
    } else if FIELDS.any_present(root) {
        let id = root
            .get(LEGACY_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or(LEGACY_DEFAULT_SPECIES);
        let state = decode_state(root, id, &mut skipped);
        states.insert(SpeciesId::from(id), state);
        SchemaVersion::Legacy
    } else {
        return Err(RaceError::Import(
            "payload has neither `stateByConfigId` nor legacy state keys".to_string(),
        ));
    };

    for path in &skipped {
        warn!(field = %path, %schema, "skipped unusable snapshot field");
    }

    let report = ImportReport {
        schema,
        species_restored: states.keys().cloned().collect(),
        skipped_fields: skipped,
    };
    Ok((states, report))
}

/// Accepted key spellings, first match wins.
#[derive(Debug, Clone, Copy)]
struct FieldNames {
    generation: &'static [&'static str],
    best_fitness_all_time: &'static [&'static str],
    best_weights_all_time: &'static [&'static str],
    best_fitness_last_generation: &'static [&'static str],
    best_weights_last_generation: &'static [&'static str],
    total_time: &'static [&'static str],
}

const FIELDS: FieldNames = FieldNames {
    generation: &["generation"],
    best_fitness_all_time: &["bestFitnessAllTime", "bestFitness"],
    best_weights_all_time: &["bestWeightsAllTime", "bestWeights"],
    best_fitness_last_generation: &["bestFitnessLastGeneration"],
    best_weights_last_generation: &["bestWeightsLastGeneration"],
    total_time: &["totalTime"],
};

impl FieldNames {
    fn all(&self) -> impl Iterator<Item = &'static str> {
        [
            self.generation,
            self.best_fitness_all_time,
            self.best_weights_all_time,
            self.best_fitness_last_generation,
            self.best_weights_last_generation,
            self.total_time,
        ]
        .into_iter()
        .flatten()
        .copied()
    }

    fn any_present(&self, object: &Map<String, Value>) -> bool {
        self.all().any(|key| object.contains_key(key))
    }
}

fn lookup<'a>(
    object: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|&key| object.get(key).map(|value| (key, value)))
}

fn decode_state(object: &Map<String, Value>, species: &str, skipped: &mut Vec<String>) -> EvolutionState {
    let names = FIELDS;
    let mut state = EvolutionState::default();
    let mut skip = |key: &str| skipped.push(format!("{species}.{key}"));

    if let Some((key, value)) = lookup(object, names.generation) {
        match value.as_u64().and_then(|g| u32::try_from(g).ok()) {
            Some(generation) => state.generation = generation,
            None => skip(key),
        }
    }

    let number = |keys: &[&'static str], target: &mut f64, skip: &mut dyn FnMut(&str)| {
        if let Some((key, value)) = lookup(object, keys) {
            match value.as_f64().filter(|v| v.is_finite()) {
                Some(v) => *target = v,
                None => skip(key),
            }
        }
    };
    number(names.best_fitness_all_time, &mut state.best_fitness_all_time, &mut skip);
    number(
        names.best_fitness_last_generation,
        &mut state.best_fitness_last_generation,
        &mut skip,
    );
    number(names.total_time, &mut state.total_time, &mut skip);

    if let Some((key, value)) = lookup(object, names.best_weights_all_time) {
        match decode_weights(value) {
            Ok(weights) => state.best_weights_all_time = weights,
            Err(_) => skip(key),
        }
    }
    if let Some((key, value)) = lookup(object, names.best_weights_last_generation) {
        match decode_weights(value) {
            Ok(weights) => state.best_weights_last_generation = weights,
            Err(_) => skip(key),
        }
    }

    state
}

/// `null` is a valid "no brain yet".
fn decode_weights(value: &Value) -> Result<Option<NetworkWeights>> {
    if value.is_null() {
        return Ok(None);
    }
    let weights = NetworkWeights::deserialize(value)?;
    weights.architecture()?;
    if weights.values().any(|v| !v.is_finite()) {
        return Err(RaceError::InvalidNumericValue(
            "stored weights contain non-finite values".to_string(),
        ));
    }
    Ok(Some(weights))
}
