//! Distance functions shared by the store, the graph and the re-ranker.
//!
//! Convention used everywhere in this crate: [`DistanceMetric::distance`] is
//! **lower-is-better**, [`DistanceMetric::similarity`] is **higher-is-better**.
//! Graph traversal and ordering only ever look at distances; similarity is the
//! score reported to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`. Inputs are normalised inside the metric, so callers do
    /// not need to pre-normalise. A zero vector has similarity 0 with everything.
    #[default]
    Cosine,
    /// Negated inner product. Only meaningful as a ranking for vectors of
    /// comparable norm.
    Dot,
    /// Euclidean distance.
    L2,
}

impl DistanceMetric {
    pub const ALL: [Self; 3] = [Self::Cosine, Self::Dot, Self::L2];

    /// Lower is better. Both slices must have the same length.
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Dot => -dot(a, b),
            Self::L2 => l2_squared(a, b).sqrt(),
        }
    }

    /// Higher is better.
    #[inline]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        self.score(self.distance(a, b))
    }

    /// Convert a distance produced by this metric into its similarity score.
    #[inline]
    pub fn score(self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::Dot | Self::L2 => -distance,
        }
    }

    /// Stable identifier used by the on-disk format.
    pub const fn id(self) -> u8 {
        match self {
            Self::Cosine => 0,
            Self::Dot => 1,
            Self::L2 => 2,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Cosine),
            1 => Some(Self::Dot),
            2 => Some(Self::L2),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Ok(Self::Cosine),
            "dot" | "ip" | "inner_product" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!(
                "unsupported metric '{other}' (expected 'cosine', 'dot' or 'l2')"
            )),
        }
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product = dot(a, b);
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cosine_ignores_magnitude() {
        let a = [1.0, 0.0, 0.0];
        let b = [10.0, 0.0, 0.0];
        assert!(DistanceMetric::Cosine.distance(&a, &b).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_orthogonal() {
        let zero = [0.0, 0.0];
        let a = [0.3, 0.4];
        assert_eq!(DistanceMetric::Cosine.similarity(&zero, &a), 0.0);
    }

    #[test]
    fn dot_and_l2_scores() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        assert_eq!(DistanceMetric::Dot.distance(&a, &b), -11.0);
        assert_eq!(DistanceMetric::Dot.similarity(&a, &b), 11.0);
        assert!((DistanceMetric::L2.distance(&a, &b) - 8.0f32.sqrt()).abs() < 1e-6);
        assert!(DistanceMetric::L2.similarity(&a, &b) < 0.0);
    }

    #[test]
    fn metric_ids_and_names_are_stable() {
        for metric in DistanceMetric::ALL {
            assert_eq!(DistanceMetric::from_id(metric.id()), Some(metric));
            assert_eq!(metric.to_string().parse::<DistanceMetric>(), Ok(metric));
        }
        assert_eq!(DistanceMetric::from_id(9), None);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    fn vector_pair() -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
        (1usize..32).prop_flat_map(|dim| {
            (
                prop::collection::vec(-10.0f32..10.0, dim),
                prop::collection::vec(-10.0f32..10.0, dim),
            )
        })
    }

    proptest! {
        #[test]
        fn proptest_distances_are_symmetric((a, b) in vector_pair()) {
            for metric in DistanceMetric::ALL {
                let ab = metric.distance(&a, &b);
                let ba = metric.distance(&b, &a);
                prop_assert!((ab - ba).abs() <= 1e-3 * (1.0 + ab.abs()));
            }
        }

        #[test]
        fn proptest_cosine_distance_is_bounded((a, b) in vector_pair()) {
            let d = DistanceMetric::Cosine.distance(&a, &b);
            prop_assert!((0.0..=2.0).contains(&d));
        }

        #[test]
        fn proptest_self_distance_is_minimal((a, b) in vector_pair()) {
            let norm: f32 = a.iter().map(|x| x * x).sum();
            prop_assume!(norm > 1e-3);
            for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
                prop_assert!(metric.distance(&a, &a) <= metric.distance(&a, &b) + 1e-4);
            }
        }
    }
}
