//! Parameter tuples and the sweep grid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SweepError;

/// One point of the sweep grid.
///
/// Serialized as a three-element array `[facts, entities, episodes]` so grids
/// stay compact in TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct ParameterTuple {
    pub facts_limit: u32,
    pub entities_limit: u32,
    pub episodes_limit: u32,
}

impl ParameterTuple {
    pub const fn new(facts_limit: u32, entities_limit: u32, episodes_limit: u32) -> Self {
        Self {
            facts_limit,
            entities_limit,
            episodes_limit,
        }
    }

    /// Values in settings order: facts, entities, episodes.
    pub fn values(&self) -> [u32; 3] {
        [self.facts_limit, self.entities_limit, self.episodes_limit]
    }
}

impl From<[u32; 3]> for ParameterTuple {
    fn from(v: [u32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<ParameterTuple> for [u32; 3] {
    fn from(t: ParameterTuple) -> Self {
        t.values()
    }
}

impl fmt::Display for ParameterTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FACTS={}, ENTITIES={}, EPISODES={}",
            self.facts_limit, self.entities_limit, self.episodes_limit
        )
    }
}

impl FromStr for ParameterTuple {
    type Err = SweepError;

    /// Parse `"facts,entities,episodes"`, e.g. `"25,15,5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(SweepError::InvalidConfig(format!(
                "parameter tuple {:?} must have exactly three comma-separated values",
                s
            )));
        }

        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                SweepError::InvalidConfig(format!(
                    "parameter tuple {:?}: {:?} is not a non-negative integer",
                    s, part
                ))
            })?;
        }
        Ok(Self::from(values))
    }
}

/// Grid swept when no grid is configured: (facts, entities, episodes),
/// weighted towards the hard question category.
pub fn default_grid() -> Vec<ParameterTuple> {
    vec![
        ParameterTuple::new(25, 15, 5),
        ParameterTuple::new(30, 12, 5),
        ParameterTuple::new(35, 10, 5),
        ParameterTuple::new(40, 8, 3),
        ParameterTuple::new(50, 5, 0),
        ParameterTuple::new(30, 20, 0),
        ParameterTuple::new(25, 25, 0),
        ParameterTuple::new(45, 5, 5),
    ]
}

/// Deterministic SHA-256 digest of an ordered grid.
pub fn grid_digest(grid: &[ParameterTuple]) -> String {
    let mut hasher = Sha256::new();
    for tuple in grid {
        for value in tuple.values() {
            hasher.update(value.to_le_bytes());
        }
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
