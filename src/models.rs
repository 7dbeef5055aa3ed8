use chrono::NaiveDateTime;
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub rating: f64,
    pub questions_asked: Option<u32>,
    pub submitted_at: NaiveDateTime,
    pub progress: f64,
}

/// A review with its age relative to the table's reference date attached.
#[derive(Debug, Clone)]
pub struct Review {
    pub rating: f64,
    pub questions_asked: Option<u32>,
    pub submitted_at: NaiveDateTime,
    pub progress: f64,
    pub age_in_days: i64,
}

/// The review table every rating computation reads from.
///
/// Built once from raw records, which is the only point where `age_in_days`
/// is derived. There are no mutating accessors afterwards.
#[derive(Debug, Clone)]
pub struct ReviewTable {
    reference: NaiveDateTime,
    reviews: Vec<Review>,
}

impl ReviewTable {
    pub fn from_records(records: Vec<ReviewRecord>, reference: NaiveDateTime) -> Self {
        let reviews = records
            .into_iter()
            .map(|record| Review {
                age_in_days: age_in_days(record.submitted_at, reference),
                rating: record.rating,
                questions_asked: record.questions_asked,
                submitted_at: record.submitted_at,
                progress: record.progress,
            })
            .collect();

        Self { reference, reviews }
    }

    pub fn reference(&self) -> NaiveDateTime {
        self.reference
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }
}

/// Whole days elapsed between submission and reference, rounded toward
/// negative infinity so that anything submitted after the reference is negative.
pub fn age_in_days(submitted_at: NaiveDateTime, reference: NaiveDateTime) -> i64 {
    reference
        .signed_duration_since(submitted_at)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}

/// Four bucket weights, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights(pub [f64; 4]);

impl Weights {
    pub const TIME_DEFAULT: Weights = Weights([28.0, 26.0, 24.0, 22.0]);
    pub const PROGRESS_DEFAULT: Weights = Weights([22.0, 24.0, 26.0, 28.0]);

    pub fn new(w1: f64, w2: f64, w3: f64, w4: f64) -> Self {
        Self([w1, w2, w3, w4])
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendWeights {
    pub time: f64,
    pub user: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            time: 50.0,
            user: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketStat {
    pub label: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingCount {
    pub rating: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub key: f64,
    pub count: usize,
    pub avg_rating: f64,
}
