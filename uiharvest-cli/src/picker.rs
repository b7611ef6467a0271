use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uiharvest::ElementCandidate;

/// Chooses which candidate an exploration cycle clicks.
pub trait ElementPicker: Send + Sync {
    fn pick<'a>(&mut self, candidates: &'a [ElementCandidate]) -> Option<&'a ElementCandidate>;
}

/// Uniformly random choice.
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible choices for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementPicker for RandomPicker {
    fn pick<'a>(&mut self, candidates: &'a [ElementCandidate]) -> Option<&'a ElementCandidate> {
        candidates.choose(&mut self.rng)
    }
}
