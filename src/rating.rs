use crate::error::RatingError;
use crate::models::{BucketStat, Review, ReviewTable, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Age,
    Progress,
}

impl Dimension {
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Age => "age_in_days",
            Dimension::Progress => "progress",
        }
    }

    fn value(self, review: &Review) -> f64 {
        match self {
            Dimension::Age => review.age_in_days as f64,
            Dimension::Progress => review.progress,
        }
    }
}

/// Four contiguous buckets over one column: `<= e0`, `(e0, e1]`, `(e1, e2]`, `> e2`.
///
/// Values below `floor` belong to no bucket.
#[derive(Debug, Clone, Copy)]
pub struct BucketScheme {
    pub dimension: Dimension,
    pub floor: Option<f64>,
    pub edges: [f64; 3],
}

pub const TIME_BUCKETS: BucketScheme = BucketScheme {
    dimension: Dimension::Age,
    floor: Some(0.0),
    edges: [30.0, 90.0, 180.0],
};

pub const PROGRESS_BUCKETS: BucketScheme = BucketScheme {
    dimension: Dimension::Progress,
    floor: None,
    edges: [10.0, 45.0, 75.0],
};

impl BucketScheme {
    pub fn locate(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        if let Some(floor) = self.floor {
            if value < floor {
                return None;
            }
        }
        let index = self
            .edges
            .iter()
            .position(|&edge| value <= edge)
            .unwrap_or(self.edges.len());
        Some(index)
    }

    pub fn label(&self, index: usize) -> String {
        let name = self.dimension.name();
        match index {
            0 => format!("{name} <= {}", self.edges[0]),
            3 => format!("{name} > {}", self.edges[2]),
            i => format!("{} < {name} <= {}", self.edges[i - 1], self.edges[i]),
        }
    }
}

/// Per-bucket count and mean, without applying the empty-bucket policy.
pub fn bucket_breakdown(
    table: &ReviewTable,
    scheme: &BucketScheme,
    weights: &Weights,
) -> Vec<BucketStat> {
    let mut sums = [0.0_f64; 4];
    let mut counts = [0_usize; 4];
    let mut unplaced = 0usize;

    for review in table.reviews() {
        match scheme.locate(scheme.dimension.value(review)) {
            Some(index) => {
                sums[index] += review.rating;
                counts[index] += 1;
            }
            None => unplaced += 1,
        }
    }

    if unplaced > 0 {
        tracing::debug!(
            dimension = scheme.dimension.name(),
            excluded = unplaced,
            "records outside every bucket were excluded from the weighted average"
        );
    }

    (0..4)
        .map(|index| BucketStat {
            label: scheme.label(index),
            count: counts[index],
            mean: (counts[index] > 0).then(|| sums[index] / counts[index] as f64),
            weight: weights.0[index],
        })
        .collect()
}

/// Sum over buckets of `mean * weight / 100`. Any empty bucket fails the call.
pub fn bucketed_weighted_mean(
    table: &ReviewTable,
    scheme: &BucketScheme,
    weights: &Weights,
) -> Result<f64, RatingError> {
    if weights.total() != 100.0 {
        tracing::debug!(
            total = weights.total(),
            "weights do not sum to 100; result is scaled accordingly"
        );
    }

    let mut weighted = 0.0;
    for stat in bucket_breakdown(table, scheme, weights) {
        tracing::debug!(bucket = %stat.label, count = stat.count, "bucket populated");
        let mean = stat.mean.ok_or_else(|| RatingError::EmptyBucket {
            dimension: scheme.dimension.name(),
            bucket: stat.label.clone(),
        })?;
        if !mean.is_finite() {
            return Err(RatingError::NonFiniteMean {
                dimension: scheme.dimension.name(),
                bucket: stat.label,
            });
        }
        weighted += mean * stat.weight / 100.0;
    }

    Ok(weighted)
}

pub fn time_based_weighted_average(
    table: &ReviewTable,
    weights: &Weights,
) -> Result<f64, RatingError> {
    bucketed_weighted_mean(table, &TIME_BUCKETS, weights)
}

pub fn user_based_weighted_average(
    table: &ReviewTable,
    weights: &Weights,
) -> Result<f64, RatingError> {
    bucketed_weighted_mean(table, &PROGRESS_BUCKETS, weights)
}

/// Blend of the time and progress averages, each computed with its default weights.
pub fn course_weighted_rating(
    table: &ReviewTable,
    time_w: f64,
    user_w: f64,
) -> Result<f64, RatingError> {
    let time = time_based_weighted_average(table, &Weights::TIME_DEFAULT)?;
    let user = user_based_weighted_average(table, &Weights::PROGRESS_DEFAULT)?;
    Ok(time * time_w / 100.0 + user * user_w / 100.0)
}
