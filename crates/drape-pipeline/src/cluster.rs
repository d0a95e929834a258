//! Two-means split of Lab samples in the a*/b* plane.
//!
//! Garment pixels in a photo are a mix of the fabric color and shading
//! (folds, shadows, highlights) that pulls toward neutral. Splitting the
//! chromaticity plane into a neutral and a chromatic group, then taking
//! the chromatic group's mean, recovers the fabric color without the
//! shading dragging it toward gray.
//!
//! The split is deterministic: seeds are the neutral origin and the
//! first sample of maximum chroma, and ties go to the neutral side.

use serde::{Deserialize, Serialize};

use crate::lab::Lab;

/// Default number of assignment/update rounds.
pub const DEFAULT_ITERATIONS: usize = 6;

/// Mean values of one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Mean Lab color of the members.
    pub mean: Lab,
    /// Mean per-sample chroma (not the chroma of the mean).
    pub mean_chroma: f64,
    /// Number of members.
    pub size: usize,
}

/// Result of [`two_means_ab`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// The cluster with the higher mean chroma.
    pub chromatic: ClusterSummary,
    /// The other cluster.
    pub neutral: ClusterSummary,
}

impl Split {
    /// Share of all samples in the chromatic cluster.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn chromatic_share(&self) -> f64 {
        let total = (self.chromatic.size + self.neutral.size).max(1);
        self.chromatic.size as f64 / total as f64
    }
}

#[derive(Clone, Copy)]
struct Centroid {
    a: f64,
    b: f64,
}

impl Centroid {
    fn distance_sq(self, s: &Lab) -> f64 {
        let da = s.a - self.a;
        let db = s.b - self.b;
        da.mul_add(da, db * db)
    }
}

/// Which side each sample falls on: `true` for the seed-1 side.
fn assign(samples: &[Lab], c0: Centroid, c1: Centroid) -> impl Iterator<Item = bool> + '_ {
    samples
        .iter()
        .map(move |s| c0.distance_sq(s) > c1.distance_sq(s))
}

#[derive(Default)]
struct Accumulator {
    l: f64,
    a: f64,
    b: f64,
    chroma: f64,
    n: usize,
}

impl Accumulator {
    fn add(&mut self, s: &Lab) {
        self.l += s.l;
        self.a += s.a;
        self.b += s.b;
        self.chroma += s.chroma();
        self.n += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn centroid(&self) -> Option<Centroid> {
        (self.n > 0).then(|| Centroid {
            a: self.a / self.n as f64,
            b: self.b / self.n as f64,
        })
    }

    /// Summary of the members. An empty cluster reports `fallback_l` as
    /// its lightness and zero chroma.
    #[allow(clippy::cast_precision_loss)]
    fn summary(&self, fallback_l: f64) -> ClusterSummary {
        if self.n == 0 {
            return ClusterSummary {
                mean: Lab::new(fallback_l, 0.0, 0.0),
                mean_chroma: 0.0,
                size: 0,
            };
        }
        let n = self.n as f64;
        ClusterSummary {
            mean: Lab::new(self.l / n, self.a / n, self.b / n),
            mean_chroma: self.chroma / n,
            size: self.n,
        }
    }
}

/// Split `samples` into a neutral and a chromatic group.
///
/// Runs `iterations` rounds of assign-then-recenter in the a*/b* plane.
/// A cluster that loses all members keeps its previous centroid. After
/// the last round each sample is assigned once more to compute the
/// summaries; `empty_l` is the lightness reported for a cluster with
/// no members. The cluster with the larger mean chroma is reported as
/// chromatic, with the origin-seeded cluster winning ties.
///
/// Returns `None` for an empty sample set.
#[must_use]
pub fn two_means_ab(samples: &[Lab], iterations: usize, empty_l: f64) -> Option<Split> {
    let seed = samples.iter().fold(None::<&Lab>, |best, s| match best {
        Some(b) if s.chroma() <= b.chroma() => Some(b),
        _ => Some(s),
    })?;

    let mut c0 = Centroid { a: 0.0, b: 0.0 };
    let mut c1 = Centroid {
        a: seed.a,
        b: seed.b,
    };

    for _ in 0..iterations {
        let mut acc0 = Accumulator::default();
        let mut acc1 = Accumulator::default();
        for (s, far) in samples.iter().zip(assign(samples, c0, c1)) {
            if far {
                acc1.add(s);
            } else {
                acc0.add(s);
            }
        }
        c0 = acc0.centroid().unwrap_or(c0);
        c1 = acc1.centroid().unwrap_or(c1);
    }

    let mut acc0 = Accumulator::default();
    let mut acc1 = Accumulator::default();
    for (s, far) in samples.iter().zip(assign(samples, c0, c1)) {
        if far {
            acc1.add(s);
        } else {
            acc0.add(s);
        }
    }
    let m0 = acc0.summary(empty_l);
    let m1 = acc1.summary(empty_l);

    Some(if m0.mean_chroma >= m1.mean_chroma {
        Split {
            chromatic: m0,
            neutral: m1,
        }
    } else {
        Split {
            chromatic: m1,
            neutral: m0,
        }
    })
}
