//! Per-species evolution bookkeeping and the generation-marker history.

use serde::{Deserialize, Serialize};

use crate::network::NetworkWeights;

/// Evolution state of one species.
///
/// Serialized field names match the persisted snapshot schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvolutionState {
    pub generation: u32,
    /// Never decreases across generations.
    pub best_fitness_all_time: f64,
    pub best_weights_all_time: Option<NetworkWeights>,
    pub best_fitness_last_generation: f64,
    pub best_weights_last_generation: Option<NetworkWeights>,
    /// Seconds spent across all finished generations.
    pub total_time: f64,
    /// Death markers of past generations; not persisted.
    #[serde(skip)]
    pub markers: MarkerHistory,
}

impl EvolutionState {
    /// Back to generation 0 with no stored brains.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Where a generation's best car ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMarker {
    pub x: f64,
    pub y: f64,
    pub generation: u32,
    pub fitness: f64,
    /// Seconds the generation ran.
    pub duration: f64,
    /// Progress per second.
    pub score: f64,
    pub is_all_time_best: bool,
    pub is_last_gen_best: bool,
}

impl GenerationMarker {
    pub fn new(x: f64, y: f64, generation: u32, fitness: f64, duration: f64) -> Self {
        Self {
            x,
            y,
            generation,
            fitness,
            duration,
            score: fitness / duration.max(1e-3),
            is_all_time_best: false,
            is_last_gen_best: false,
        }
    }
}

/// Append-only marker list pruned to a bounded window.
///
/// The all-time-best marker and the newest marker survive pruning, so the
/// window never shrinks below two.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerHistory {
    markers: Vec<GenerationMarker>,
}

impl MarkerHistory {
    pub fn markers(&self) -> &[GenerationMarker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn all_time_best(&self) -> Option<&GenerationMarker> {
        self.markers.iter().find(|m| m.is_all_time_best)
    }

    /// Appends `marker` as the newest entry and prunes to `max_len`.
    pub fn push(&mut self, mut marker: GenerationMarker, is_all_time_best: bool, max_len: usize) {
        for m in &mut self.markers {
            m.is_last_gen_best = false;
            if is_all_time_best {
                m.is_all_time_best = false;
            }
        }
        marker.is_last_gen_best = true;
        marker.is_all_time_best = is_all_time_best || self.all_time_best().is_none();
        self.markers.push(marker);

        // Room for the all-time best and the newest marker.
        let max_len = max_len.max(2);
        while self.markers.len() > max_len {
            let newest = self.markers.len() - 1;
            match self.markers[..newest].iter().position(|m| !m.is_all_time_best) {
                Some(oldest) => {
                    self.markers.remove(oldest);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pruning_keeps_all_time_best() {
        let mut history = MarkerHistory::default();
        history.push(GenerationMarker::new(0.0, 0.0, 1, 500.0, 10.0), true, 3);
        for generation in 2..10 {
            history.push(
                GenerationMarker::new(0.0, 0.0, generation, 100.0, 10.0),
                false,
                3,
            );
        }
        assert_eq!(history.len(), 3);
        let best = history.all_time_best().unwrap();
        assert_eq!(best.generation, 1);
        let last = history.markers().last().unwrap();
        assert_eq!(last.generation, 9);
        assert!(last.is_last_gen_best);
        assert_eq!(history.markers().iter().filter(|m| m.is_last_gen_best).count(), 1);
    }

    #[test]
    fn test_window_of_one_keeps_newest() {
        let mut history = MarkerHistory::default();
        history.push(GenerationMarker::new(0.0, 0.0, 1, 500.0, 10.0), true, 1);
        history.push(GenerationMarker::new(0.0, 0.0, 2, 100.0, 10.0), false, 1);
        history.push(GenerationMarker::new(0.0, 0.0, 3, 90.0, 10.0), false, 1);

        let kept: Vec<(u32, bool, bool)> = history
            .markers()
            .iter()
            .map(|m| (m.generation, m.is_all_time_best, m.is_last_gen_best))
            .collect();
        assert_eq!(kept, vec![(1, true, false), (3, false, true)]);
    }

    #[test]
    fn test_new_best_moves_flag() {
        let mut history = MarkerHistory::default();
        history.push(GenerationMarker::new(0.0, 0.0, 1, 50.0, 1.0), true, 10);
        history.push(GenerationMarker::new(0.0, 0.0, 2, 80.0, 1.0), true, 10);
        assert_eq!(history.all_time_best().unwrap().generation, 2);
        assert_eq!(
            history.markers().iter().filter(|m| m.is_all_time_best).count(),
            1
        );
    }

    #[test]
    fn test_score_is_progress_per_second() {
        let marker = GenerationMarker::new(1.0, 2.0, 3, 300.0, 6.0);
        assert_eq!(marker.score, 50.0);
    }

    #[test]
    fn test_state_json_keys() {
        let state = EvolutionState {
            generation: 4,
            best_fitness_all_time: 120.5,
            ..EvolutionState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["generation"], 4);
        assert_eq!(json["bestFitnessAllTime"], 120.5);
        assert!(json["bestWeightsAllTime"].is_null());
        assert!(json.get("totalTime").is_some());
        assert!(json.get("markers").is_none());
    }
}
