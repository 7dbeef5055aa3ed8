use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::models::{
    BlendWeights, BucketStat, GroupSummary, RatingCount, Review, ReviewTable, Weights,
};
use crate::rating;

/// Display settings for rendered output; never consulted by the computations.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub precision: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { precision: 5 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Score {
    pub value: Option<f64>,
    pub error: Option<String>,
}

impl<E: std::fmt::Display> From<Result<f64, E>> for Score {
    fn from(result: Result<f64, E>) -> Self {
        match result {
            Ok(value) => Score {
                value: Some(value),
                error: None,
            },
            Err(err) => Score {
                value: None,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub reference_date: String,
    pub review_count: usize,
    pub earliest_review: Option<String>,
    pub latest_review: Option<String>,
    pub average_rating: Option<f64>,
    pub distribution: Vec<RatingCount>,
    pub by_questions_asked: Vec<GroupSummary>,
    pub by_progress: Vec<GroupSummary>,
    pub time_buckets: Vec<BucketStat>,
    pub progress_buckets: Vec<BucketStat>,
    pub blend: BlendWeights,
    pub time_weighted: Score,
    pub user_weighted: Score,
    pub course_weighted: Score,
}

pub fn average_rating(table: &ReviewTable) -> Option<f64> {
    if table.is_empty() {
        return None;
    }
    let total: f64 = table.reviews().iter().map(|review| review.rating).sum();
    Some(total / table.len() as f64)
}

/// Count of reviews per distinct rating, highest rating first.
pub fn rating_distribution(table: &ReviewTable) -> Vec<RatingCount> {
    let mut counts: Vec<RatingCount> = Vec::new();
    for review in table.reviews() {
        match counts.iter_mut().find(|entry| entry.rating == review.rating) {
            Some(entry) => entry.count += 1,
            None => counts.push(RatingCount {
                rating: review.rating,
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    counts
}

fn group_by<F>(table: &ReviewTable, key: F) -> Vec<GroupSummary>
where
    F: Fn(&Review) -> Option<f64>,
{
    let mut groups: BTreeMap<u64, (f64, usize, f64)> = BTreeMap::new();
    for review in table.reviews() {
        let Some(value) = key(review) else {
            continue;
        };
        let entry = groups.entry(sort_key(value)).or_insert((value, 0, 0.0));
        entry.1 += 1;
        entry.2 += review.rating;
    }

    groups
        .into_values()
        .map(|(key, count, total)| GroupSummary {
            key,
            count,
            avg_rating: total / count as f64,
        })
        .collect()
}

// Order-preserving bit pattern so that f64 keys sort numerically in a BTreeMap.
fn sort_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

pub fn summarize_by_questions_asked(table: &ReviewTable) -> Vec<GroupSummary> {
    group_by(table, |review| review.questions_asked.map(f64::from))
}

pub fn summarize_by_progress(table: &ReviewTable) -> Vec<GroupSummary> {
    group_by(table, |review| Some(review.progress))
}

pub fn summarize(table: &ReviewTable, blend: BlendWeights) -> CourseSummary {
    CourseSummary {
        reference_date: table.reference().to_string(),
        review_count: table.len(),
        earliest_review: table
            .reviews()
            .iter()
            .map(|review| review.submitted_at)
            .min()
            .map(|at| at.to_string()),
        latest_review: table
            .reviews()
            .iter()
            .map(|review| review.submitted_at)
            .max()
            .map(|at| at.to_string()),
        average_rating: average_rating(table),
        distribution: rating_distribution(table),
        by_questions_asked: summarize_by_questions_asked(table),
        by_progress: summarize_by_progress(table),
        time_buckets: rating::bucket_breakdown(
            table,
            &rating::TIME_BUCKETS,
            &Weights::TIME_DEFAULT,
        ),
        progress_buckets: rating::bucket_breakdown(
            table,
            &rating::PROGRESS_BUCKETS,
            &Weights::PROGRESS_DEFAULT,
        ),
        blend,
        time_weighted: rating::time_based_weighted_average(table, &Weights::TIME_DEFAULT).into(),
        user_weighted: rating::user_based_weighted_average(table, &Weights::PROGRESS_DEFAULT)
            .into(),
        course_weighted: rating::course_weighted_rating(table, blend.time, blend.user).into(),
    }
}

pub fn to_json(summary: &CourseSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}

fn format_score(score: &Score, options: FormatOptions) -> String {
    match (&score.value, &score.error) {
        (Some(value), _) => format!("{:.*}", options.precision, value),
        (None, Some(error)) => format!("unavailable ({error})"),
        (None, None) => "unavailable".to_string(),
    }
}

fn write_buckets(output: &mut String, stats: &[BucketStat], options: FormatOptions) {
    for stat in stats {
        let mean = match stat.mean {
            Some(mean) => format!("{:.*}", options.precision, mean),
            None => "no ratings".to_string(),
        };
        let _ = writeln!(
            output,
            "- {}: {} ratings, mean {} (weight {})",
            stat.label, stat.count, mean, stat.weight
        );
    }
}

pub fn build_report(summary: &CourseSummary, options: FormatOptions) -> String {
    let mut output = String::new();
    let precision = options.precision;

    let _ = writeln!(output, "# Course Rating Report");
    let _ = writeln!(
        output,
        "Generated from {} reviews (ages relative to {})",
        summary.review_count, summary.reference_date
    );
    if let (Some(earliest), Some(latest)) = (&summary.earliest_review, &summary.latest_review) {
        let _ = writeln!(output, "Reviews submitted between {earliest} and {latest}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weighted Ratings");
    let _ = writeln!(
        output,
        "- Time-based: {}",
        format_score(&summary.time_weighted, options)
    );
    let _ = writeln!(
        output,
        "- User-based: {}",
        format_score(&summary.user_weighted, options)
    );
    let _ = writeln!(
        output,
        "- Course ({}% time / {}% user): {}",
        summary.blend.time,
        summary.blend.user,
        format_score(&summary.course_weighted, options)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average");
    match summary.average_rating {
        Some(average) => {
            let _ = writeln!(output, "- Plain average rating {:.*}", precision, average);
        }
        None => {
            let _ = writeln!(output, "No reviews loaded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recency Buckets");
    write_buckets(&mut output, &summary.time_buckets, options);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Progress Buckets");
    write_buckets(&mut output, &summary.progress_buckets, options);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rating Distribution");
    if summary.distribution.is_empty() {
        let _ = writeln!(output, "No reviews loaded.");
    } else {
        for entry in &summary.distribution {
            let _ = writeln!(output, "- {}: {} reviews", entry.rating, entry.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Questions Asked");
    if summary.by_questions_asked.is_empty() {
        let _ = writeln!(output, "No question counts recorded.");
    } else {
        for group in &summary.by_questions_asked {
            let _ = writeln!(
                output,
                "- {} questions: {} reviews (avg rating {:.*})",
                group.key, group.count, precision, group.avg_rating
            );
        }
    }

    output
}

/// Plain-text summary for the terminal; the per-progress table is left to the
/// JSON output since it has one row per distinct progress value.
pub fn build_summary_text(summary: &CourseSummary, options: FormatOptions) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Reviews: {}", summary.review_count);
    if let Some(average) = summary.average_rating {
        let _ = writeln!(output, "Average rating: {:.*}", options.precision, average);
    }
    for entry in &summary.distribution {
        let _ = writeln!(output, "  {}: {}", entry.rating, entry.count);
    }
    let _ = writeln!(
        output,
        "Time-based weighted average: {}",
        format_score(&summary.time_weighted, options)
    );
    let _ = writeln!(
        output,
        "User-based weighted average: {}",
        format_score(&summary.user_weighted, options)
    );
    let _ = writeln!(
        output,
        "Course weighted rating: {}",
        format_score(&summary.course_weighted, options)
    );
    output
}
