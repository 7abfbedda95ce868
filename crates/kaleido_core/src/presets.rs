//! Preset Selection
//!
//! Pure selection logic over the catalog's key list. The engine owns the
//! timer and the catalog; this module only decides which key comes next,
//! so every rotation rule is testable with a seeded RNG.

use rand::Rng;
use tracing::warn;

use crate::config::RANDOM_PRESET;

/// Ordered view of the catalog keys with the rotation rules
pub struct PresetRotation {
    keys: Vec<String>,
}

impl PresetRotation {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    fn random_key<R: Rng>(&self, rng: &mut R) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        Some(self.keys[rng.gen_range(0..self.keys.len())].clone())
    }

    /// Resolve a configured preset name to a concrete key. The random
    /// sentinel and any name the catalog does not know both fall back to a
    /// random pick; `None` only when the catalog is empty.
    pub fn resolve<R: Rng>(&self, requested: &str, rng: &mut R) -> Option<String> {
        if requested == RANDOM_PRESET {
            return self.random_key(rng);
        }
        if self.keys.iter().any(|k| k == requested) {
            return Some(requested.to_string());
        }
        warn!(preset = requested, "unknown preset, picking at random");
        self.random_key(rng)
    }

    /// The key after `current` in catalog order, wrapping at the end.
    /// An unknown current key restarts at the first entry.
    pub fn advance(&self, current: &str) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let next = match self.keys.iter().position(|k| k == current) {
            Some(index) => (index + 1) % self.keys.len(),
            None => 0,
        };
        Some(self.keys[next].clone())
    }

    /// A random key other than `current`, when more than one exists
    pub fn shuffle_pick<R: Rng>(&self, current: &str, rng: &mut R) -> Option<String> {
        if self.keys.len() < 2 {
            return self.random_key(rng);
        }
        loop {
            let pick = self.random_key(rng)?;
            if pick != current {
                return Some(pick);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rotation() -> PresetRotation {
        PresetRotation::new(vec!["warp".into(), "nebula".into(), "grid".into()])
    }

    #[test]
    fn test_resolve_known_key_is_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            rotation().resolve("nebula", &mut rng).as_deref(),
            Some("nebula")
        );
    }

    #[test]
    fn test_resolve_random_and_unknown_stay_in_catalog() {
        let rotation = rotation();
        let mut rng = StdRng::seed_from_u64(7);
        for requested in [RANDOM_PRESET, "does-not-exist"] {
            for _ in 0..20 {
                let picked = rotation.resolve(requested, &mut rng).unwrap();
                assert!(rotation.keys.contains(&picked));
            }
        }
    }

    #[test]
    fn test_empty_catalog_resolves_to_none() {
        let rotation = PresetRotation::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(rotation.resolve(RANDOM_PRESET, &mut rng), None);
        assert_eq!(rotation.advance("warp"), None);
    }

    #[test]
    fn test_advance_wraps_in_catalog_order() {
        let rotation = rotation();
        assert_eq!(rotation.advance("warp").as_deref(), Some("nebula"));
        assert_eq!(rotation.advance("nebula").as_deref(), Some("grid"));
        assert_eq!(rotation.advance("grid").as_deref(), Some("warp"));
        // Unknown key restarts at the beginning
        assert_eq!(rotation.advance("gone").as_deref(), Some("warp"));
    }

    #[test]
    fn test_shuffle_pick_avoids_current() {
        let rotation = rotation();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_ne!(rotation.shuffle_pick("nebula", &mut rng).as_deref(), Some("nebula"));
        }
    }

    #[test]
    fn test_shuffle_pick_with_single_key() {
        let rotation = PresetRotation::new(vec!["only".into()]);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(rotation.shuffle_pick("only", &mut rng).as_deref(), Some("only"));
    }
}
