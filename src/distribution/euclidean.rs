// Euclidean distribution - Bjorklund placement of k pulses over n steps

use super::{Distribution, render_mask};
use crate::error::{TactusError, TactusResult};
use std::fmt;

/// Spreads `pulses` over `steps` as evenly as possible
///
/// The mask is precomputed at construction, so `should_fire` is a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EuclideanDistribution {
    pulses: u32,
    steps: u32,
    rotation: u32,
    mask: Vec<bool>,
}

impl EuclideanDistribution {
    pub fn new(pulses: u32, steps: u32) -> TactusResult<Self> {
        Self::with_rotation(pulses, steps, 0)
    }

    /// Build a rotated rhythm; the mask is shifted left by `rotation` steps
    pub fn with_rotation(pulses: u32, steps: u32, rotation: u32) -> TactusResult<Self> {
        if steps == 0 {
            return Err(TactusError::configuration(
                "Euclidean distribution needs at least one step",
            ));
        }

        let mut mask = bjorklund(pulses, steps);
        let rotation = rotation % steps;
        mask.rotate_left(rotation as usize);

        Ok(Self {
            pulses,
            steps,
            rotation,
            mask,
        })
    }

    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    /// Number of firing steps in the mask
    pub fn pulse_count(&self) -> usize {
        self.mask.iter().filter(|&&fire| fire).count()
    }

    pub fn as_mask(&self) -> &[bool] {
        &self.mask
    }
}

impl Distribution for EuclideanDistribution {
    fn should_fire(&self, tick_in_phrase: u32, phrase_length: u32) -> bool {
        if tick_in_phrase >= phrase_length {
            return false;
        }
        // A rhythm shorter than the phrase cycles through it
        self.mask[(tick_in_phrase % self.steps) as usize]
    }
}

impl fmt::Display for EuclideanDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_mask(&self.mask))
    }
}

/// Bjorklund construction
///
/// Starts with `pulses` singleton pulse groups and `steps - pulses` singleton
/// rest groups, then repeatedly appends the minority groups onto the majority
/// groups until at most one minority group remains.
pub fn bjorklund(pulses: u32, steps: u32) -> Vec<bool> {
    let pulses = pulses.min(steps) as usize;
    let rests = steps as usize - pulses;

    let mut heads: Vec<Vec<bool>> = vec![vec![true]; pulses];
    let mut tails: Vec<Vec<bool>> = vec![vec![false]; rests];

    while heads.len().min(tails.len()) > 1 {
        let paired = heads.len().min(tails.len());

        // Unpaired groups of the majority class become the new remainder
        let remainder = if heads.len() > tails.len() {
            heads.split_off(paired)
        } else {
            tails.split_off(paired)
        };

        for (head, tail) in heads.iter_mut().zip(tails.drain(..)) {
            head.extend(tail);
        }
        tails = remainder;
    }

    heads.into_iter().chain(tails).flatten().collect()
}
