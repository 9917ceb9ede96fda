//! The nine named emotional dimensions (spec §3).

use serde::{Deserialize, Serialize};

/// One of the nine fixed emotional axes. Order here is the canonical
/// dimension order used for deterministic tie-breaks (`DominantEmotions`,
/// per-dimension delta application order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Loneliness.
    Loneliness,
    /// Excitement.
    Excitement,
    /// Frustration.
    Frustration,
    /// Jealousy.
    Jealousy,
    /// Vulnerability.
    Vulnerability,
    /// Confidence.
    Confidence,
    /// Curiosity.
    Curiosity,
    /// Affection.
    Affection,
    /// Defensiveness.
    Defensiveness,
}

impl Dimension {
    /// All nine dimensions, in canonical order.
    pub const ALL: [Dimension; 9] = [
        Dimension::Loneliness,
        Dimension::Excitement,
        Dimension::Frustration,
        Dimension::Jealousy,
        Dimension::Vulnerability,
        Dimension::Confidence,
        Dimension::Curiosity,
        Dimension::Affection,
        Dimension::Defensiveness,
    ];

    /// The floor value for this dimension: `0.3` for loneliness, `0.1` for
    /// every other dimension (spec §3).
    pub fn floor(self) -> f64 {
        match self {
            Dimension::Loneliness => 0.3,
            _ => 0.1,
        }
    }

    /// Stable index into [`Dimension::ALL`], used for tie-breaks.
    pub fn order(self) -> usize {
        Dimension::ALL.iter().position(|d| *d == self).unwrap()
    }

    /// Lowercase identifier, used as a map/config key and in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Loneliness => "loneliness",
            Dimension::Excitement => "excitement",
            Dimension::Frustration => "frustration",
            Dimension::Jealousy => "jealousy",
            Dimension::Vulnerability => "vulnerability",
            Dimension::Confidence => "confidence",
            Dimension::Curiosity => "curiosity",
            Dimension::Affection => "affection",
            Dimension::Defensiveness => "defensiveness",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_match_spec() {
        assert_eq!(Dimension::Loneliness.floor(), 0.3);
        for d in Dimension::ALL {
            if d != Dimension::Loneliness {
                assert_eq!(d.floor(), 0.1);
            }
        }
    }

    #[test]
    fn order_is_stable_and_matches_declaration() {
        assert_eq!(Dimension::Loneliness.order(), 0);
        assert_eq!(Dimension::Defensiveness.order(), 8);
    }
}
