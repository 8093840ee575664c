// Markov chain - First-order stochastic state generator
//
// Transition weights are kept per source state in a BTreeMap so the walk
// order in `next` is stable (lexicographic) across runs. Each chain owns its
// random source; a fixed seed reproduces the exact same state sequence.

use crate::error::{TactusError, TactusResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Outgoing weights of one state. Key: destination, value: weight in [0, 1]
pub type Transitions = BTreeMap<String, f64>;

/// Full transition table. Key: source state
pub type TransitionTable = BTreeMap<String, Transitions>;

#[derive(Debug, Clone)]
pub struct MarkovChain {
    table: TransitionTable,
    current: Option<String>,
    rng: StdRng,
}

impl MarkovChain {
    /// Empty chain with a deterministic random source
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Empty chain drawing from the given generator
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            table: TransitionTable::new(),
            current: None,
            rng,
        }
    }

    /// Build from a complete table, validating every weight
    pub fn from_table(table: TransitionTable, seed: u64) -> TactusResult<Self> {
        let mut chain = Self::seeded(seed);
        for (from, transitions) in &table {
            for (to, &p) in transitions {
                chain.set_transition_probability(from, to, p)?;
            }
        }
        Ok(chain)
    }

    /// Set the weight of `from -> to`; weights outside [0, 1] are rejected
    pub fn set_transition_probability(&mut self, from: &str, to: &str, p: f64) -> TactusResult<()> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TactusError::configuration(format!(
                "Transition probability {} -> {} must be within [0, 1], got {}",
                from, to, p
            )));
        }

        self.table
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), p);
        Ok(())
    }

    /// Weight of `from -> to`, if set
    pub fn transition_probability(&self, from: &str, to: &str) -> Option<f64> {
        self.table.get(from).and_then(|t| t.get(to)).copied()
    }

    /// Rescale the outgoing weights of `from` so they sum to 1
    ///
    /// Does nothing when the weights sum to 0.
    pub fn normalize(&mut self, from: &str) -> TactusResult<()> {
        let transitions = self.table.get_mut(from).ok_or_else(|| {
            TactusError::configuration(format!("Unknown Markov state '{}'", from))
        })?;

        let total: f64 = transitions.values().sum();
        if total > 0.0 {
            for weight in transitions.values_mut() {
                *weight /= total;
            }
        }
        Ok(())
    }

    /// Draw the next state
    ///
    /// Without a current state, one of the states with outgoing transitions
    /// is picked uniformly and returned as-is. Otherwise `r ∈ [0, 1)` is
    /// drawn and the first destination whose cumulative weight reaches `r`
    /// wins. When the weights sum to less than 1 and `r` lands above the
    /// total, the chain stays where it is.
    pub fn next(&mut self) -> TactusResult<&str> {
        let Some(current) = self.current.take() else {
            let candidates = self.table.values().filter(|t| !t.is_empty()).count();
            if candidates == 0 {
                return Err(TactusError::generation(
                    "Markov chain has no states with outgoing transitions",
                ));
            }

            let pick = self.rng.gen_range(0..candidates);
            let start = self
                .table
                .iter()
                .filter(|(_, t)| !t.is_empty())
                .nth(pick)
                .map(|(state, _)| state.clone());
            self.current = start;
            return self.current_state().ok_or_else(|| {
                TactusError::generation("Markov chain lost its starting state")
            });
        };

        let r: f64 = self.rng.r#gen();
        let mut cumulative = 0.0;
        let mut chosen = None;

        if let Some(transitions) = self.table.get(&current) {
            for (to, &weight) in transitions {
                if weight <= 0.0 {
                    continue;
                }
                cumulative += weight;
                if cumulative >= r {
                    chosen = Some(to.clone());
                    break;
                }
            }
        }

        self.current = Some(chosen.unwrap_or(current));
        self.current_state()
            .ok_or_else(|| TactusError::generation("Markov chain lost its current state"))
    }

    /// Jump to a known state
    pub fn set_current_state(&mut self, state: &str) -> TactusResult<()> {
        if !self.is_known(state) {
            return Err(TactusError::configuration(format!(
                "Unknown Markov state '{}'",
                state
            )));
        }
        self.current = Some(state.to_string());
        Ok(())
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Forget the current state; the transition table is kept
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Every state named in the table, as a source or a destination
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self
            .table
            .iter()
            .flat_map(|(from, transitions)| {
                std::iter::once(from.as_str()).chain(transitions.keys().map(String::as_str))
            })
            .collect();
        states.sort_unstable();
        states.dedup();
        states
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    fn is_known(&self, state: &str) -> bool {
        self.table.contains_key(state)
            || self.table.values().any(|t| t.contains_key(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_silent(seed: u64) -> MarkovChain {
        let mut chain = MarkovChain::seeded(seed);
        chain.set_transition_probability("playing", "playing", 0.8).unwrap();
        chain.set_transition_probability("playing", "silent", 0.2).unwrap();
        chain.set_transition_probability("silent", "playing", 0.5).unwrap();
        chain.set_transition_probability("silent", "silent", 0.5).unwrap();
        chain
    }

    #[test]
    fn test_probability_bounds() {
        let mut chain = MarkovChain::seeded(1);
        assert!(chain.set_transition_probability("a", "b", 1.5).unwrap_err().is_configuration());
        assert!(chain.set_transition_probability("a", "b", -0.1).unwrap_err().is_configuration());
        assert!(chain.set_transition_probability("a", "b", f64::NAN).is_err());
        assert!(chain.set_transition_probability("a", "b", 0.0).is_ok());
        assert!(chain.set_transition_probability("a", "b", 1.0).is_ok());
        assert_eq!(chain.transition_probability("a", "b"), Some(1.0));
    }

    #[test]
    fn test_normalize() {
        let mut chain = MarkovChain::seeded(1);
        chain.set_transition_probability("a", "b", 0.2).unwrap();
        chain.set_transition_probability("a", "c", 0.6).unwrap();
        chain.normalize("a").unwrap();

        let b = chain.transition_probability("a", "b").unwrap();
        let c = chain.transition_probability("a", "c").unwrap();
        assert!((b - 0.25).abs() < 1e-12);
        assert!((c - 0.75).abs() < 1e-12);

        // Zero total is left untouched
        chain.set_transition_probability("z", "a", 0.0).unwrap();
        chain.normalize("z").unwrap();
        assert_eq!(chain.transition_probability("z", "a"), Some(0.0));

        assert!(chain.normalize("missing").is_err());
    }

    #[test]
    fn test_first_draw_picks_a_source_state() {
        let mut chain = MarkovChain::seeded(9);
        chain.set_transition_probability("a", "b", 1.0).unwrap();

        // "b" has no outgoing transitions, so only "a" can start
        assert_eq!(chain.next().unwrap(), "a");
        assert_eq!(chain.next().unwrap(), "b");
    }

    #[test]
    fn test_first_draw_is_uniform_over_sources() {
        let mut seen = std::collections::BTreeSet::new();
        for seed in 0..64 {
            let mut chain = playing_silent(seed);
            seen.insert(chain.next().unwrap().to_string());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_empty_chain_is_generation_error() {
        let mut chain = MarkovChain::seeded(3);
        let err = chain.next().unwrap_err();
        assert!(matches!(err, TactusError::Generation(_)));
    }

    #[test]
    fn test_fixed_seed_reproducible() {
        let mut first = playing_silent(42);
        let mut second = playing_silent(42);

        let a: Vec<String> = (0..200).map(|_| first.next().unwrap().to_string()).collect();
        let b: Vec<String> = (0..200).map(|_| second.next().unwrap().to_string()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_retention_rate() {
        let mut chain = playing_silent(7);
        chain.set_current_state("playing").unwrap();

        let mut from_playing = 0u32;
        let mut stayed = 0u32;
        for _ in 0..1000 {
            let before = chain.current_state().unwrap() == "playing";
            let after = chain.next().unwrap() == "playing";
            if before {
                from_playing += 1;
                if after {
                    stayed += 1;
                }
            }
        }

        let retention = stayed as f64 / from_playing as f64;
        assert!(
            (retention - 0.8).abs() < 0.06,
            "retention {} over {} draws",
            retention,
            from_playing
        );
    }

    #[test]
    fn test_under_specified_table_stays_put() {
        let mut chain = MarkovChain::seeded(5);
        chain.set_transition_probability("a", "b", 0.0).unwrap();
        chain.set_current_state("a").unwrap();

        for _ in 0..50 {
            assert_eq!(chain.next().unwrap(), "a");
        }
    }

    #[test]
    fn test_partial_weight_mixes_stay_and_move() {
        let mut stays = 0;
        let mut moves = 0;
        for seed in 0..200 {
            let mut chain = MarkovChain::seeded(seed);
            chain.set_transition_probability("a", "b", 0.3).unwrap();
            chain.set_current_state("a").unwrap();
            match chain.next().unwrap() {
                "a" => stays += 1,
                "b" => moves += 1,
                other => panic!("unexpected state {}", other),
            }
        }
        assert!(stays > moves);
        assert!(moves > 0);
    }

    #[test]
    fn test_state_control() {
        let mut chain = playing_silent(11);
        assert_eq!(chain.current_state(), None);

        chain.set_current_state("silent").unwrap();
        assert_eq!(chain.current_state(), Some("silent"));

        let err = chain.set_current_state("tacet").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(chain.current_state(), Some("silent"));

        chain.reset();
        assert_eq!(chain.current_state(), None);
        assert_eq!(chain.transition_probability("playing", "playing"), Some(0.8));
    }

    #[test]
    fn test_destination_only_state_is_known() {
        let mut chain = MarkovChain::seeded(2);
        chain.set_transition_probability("a", "b", 1.0).unwrap();
        assert!(chain.set_current_state("b").is_ok());
        assert_eq!(chain.states(), vec!["a", "b"]);
    }

    #[test]
    fn test_from_table() {
        let table: TransitionTable = serde_json::from_str(
            r#"{"playing":{"playing":0.8,"silent":0.2},"silent":{"playing":1.0}}"#,
        )
        .unwrap();
        let chain = MarkovChain::from_table(table, 1).unwrap();
        assert_eq!(chain.transition_probability("silent", "playing"), Some(1.0));

        let bad: TransitionTable = serde_json::from_str(r#"{"a":{"b":2.0}}"#).unwrap();
        assert!(MarkovChain::from_table(bad, 1).is_err());
    }
}
