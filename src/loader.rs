use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::RatingError;
use crate::models::{ReviewRecord, ReviewTable};

pub const RATING_COLUMN: &str = "Rating";
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const PROGRESS_COLUMN: &str = "Progress";
pub const QUESTIONS_COLUMN: &str = "Questions Asked";

const REQUIRED_COLUMNS: [&str; 3] = [RATING_COLUMN, TIMESTAMP_COLUMN, PROGRESS_COLUMN];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Rating")]
    rating: Option<f64>,
    #[serde(rename = "Timestamp")]
    timestamp: Option<String>,
    #[serde(rename = "Progress")]
    progress: Option<f64>,
    #[serde(rename = "Questions Asked", default)]
    questions_asked: Option<f64>,
}

pub fn load_from_path(path: &Path, reference: NaiveDateTime) -> Result<ReviewTable, RatingError> {
    let file = File::open(path).map_err(csv::Error::from)?;
    tracing::info!(path = %path.display(), "loading course reviews");
    load_from_reader(file, reference)
}

pub fn load_from_reader<R: Read>(
    source: R,
    reference: NaiveDateTime,
) -> Result<ReviewTable, RatingError> {
    read_table(reader_builder().from_reader(source), reference)
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All);
    builder
}

fn read_table<R: Read>(
    mut reader: csv::Reader<R>,
    reference: NaiveDateTime,
) -> Result<ReviewTable, RatingError> {
    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(RatingError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = index + 1;
        let raw = result?;

        let rating = finite(raw.rating, row, RATING_COLUMN)?;
        let progress = finite(raw.progress, row, PROGRESS_COLUMN)?;
        let questions_asked = raw
            .questions_asked
            .map(|count| question_count(count, row))
            .transpose()?;
        let timestamp = raw
            .timestamp
            .filter(|value| !value.trim().is_empty())
            .ok_or(RatingError::MissingField {
                row,
                field: TIMESTAMP_COLUMN,
            })?;
        let submitted_at =
            parse_timestamp(&timestamp).ok_or_else(|| RatingError::InvalidTimestamp {
                row,
                value: timestamp.clone(),
            })?;

        records.push(ReviewRecord {
            rating,
            questions_asked,
            submitted_at,
            progress,
        });
    }

    let table = ReviewTable::from_records(records, reference);
    let ahead = table
        .reviews()
        .iter()
        .filter(|review| review.age_in_days < 0)
        .count();
    if ahead > 0 {
        tracing::warn!(
            count = ahead,
            reference = %reference,
            "reviews submitted after the reference date"
        );
    }
    tracing::info!(rows = table.len(), "course reviews loaded");
    Ok(table)
}

/// NaN counts as a missing value; infinities are rejected as unusable.
fn finite(value: Option<f64>, row: usize, field: &'static str) -> Result<f64, RatingError> {
    match value {
        None => Err(RatingError::MissingField { row, field }),
        Some(value) if value.is_nan() => Err(RatingError::MissingField { row, field }),
        Some(value) if value.is_infinite() => Err(RatingError::InvalidValue { row, field, value }),
        Some(value) => Ok(value),
    }
}

// Exports store the count as a float, e.g. `2.0`.
fn question_count(value: f64, row: usize) -> Result<u32, RatingError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(RatingError::InvalidValue {
            row,
            field: QUESTIONS_COLUMN,
            value,
        })
    }
}

/// Accepts the date-time layouts seen in exported review files, or a bare
/// date which is taken as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDateTime {
        parse_timestamp("2021-02-10 00:00:00").unwrap()
    }

    #[test]
    fn loads_rows_and_derives_age() {
        let data = "\
Rating,Timestamp,Enrolled,Progress,Questions Asked,Questions Answered
5.0,2021-02-05 07:45:55,2021-01-25 15:12:08,5.0,0.0,0.0
4.5,2020-09-10 11:00:00,2020-08-01 10:00:00,80.0,2.0,1.0
";
        let table = load_from_reader(data.as_bytes(), reference()).unwrap();
        assert_eq!(table.len(), 2);

        let first = &table.reviews()[0];
        assert_eq!(first.rating, 5.0);
        assert_eq!(first.age_in_days, 4);
        assert_eq!(first.progress, 5.0);
        assert_eq!(first.questions_asked, Some(0));
        assert_eq!(table.reviews()[1].age_in_days, 152);
    }

    #[test]
    fn questions_asked_is_optional() {
        let data = "Rating,Timestamp,Progress\n3.0,2021-01-01,20\n";
        let table = load_from_reader(data.as_bytes(), reference()).unwrap();
        assert_eq!(table.reviews()[0].questions_asked, None);
        assert_eq!(table.reviews()[0].age_in_days, 40);
    }

    #[test]
    fn missing_column_is_reported() {
        let data = "Rating,Timestamp\n3.0,2021-01-01 00:00:00\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(err, RatingError::MissingColumn("Progress")));
    }

    #[test]
    fn empty_cell_is_not_treated_as_zero() {
        let data = "Rating,Timestamp,Progress\n4.0,2021-01-01 00:00:00,10\n,2021-01-02 00:00:00,30\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(
            err,
            RatingError::MissingField {
                row: 2,
                field: "Rating"
            }
        ));
    }

    #[test]
    fn empty_timestamp_and_progress_are_reported() {
        let data = "Rating,Timestamp,Progress\n4.0,,10\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(
            err,
            RatingError::MissingField {
                row: 1,
                field: "Timestamp"
            }
        ));

        let data = "Rating,Timestamp,Progress\n4.0,2021-01-01 00:00:00,\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(
            err,
            RatingError::MissingField {
                row: 1,
                field: "Progress"
            }
        ));
    }

    #[test]
    fn nan_and_infinite_values_are_rejected() {
        let data = "\
Rating,Timestamp,Progress
5.0,2021-02-01 00:00:00,5
NaN,2021-02-05 00:00:00,5
";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(
            err,
            RatingError::MissingField {
                row: 2,
                field: "Rating"
            }
        ));

        let data = "Rating,Timestamp,Progress\n4.0,2021-02-05 00:00:00,inf\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(
            err,
            RatingError::InvalidValue {
                row: 1,
                field: "Progress",
                ..
            }
        ));
    }

    #[test]
    fn fractional_or_negative_question_counts_are_rejected() {
        for count in ["2.7", "-1"] {
            let data = format!("Rating,Timestamp,Progress,Questions Asked\n4.0,2021-02-05,10,{count}\n");
            let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
            assert!(matches!(
                err,
                RatingError::InvalidValue {
                    row: 1,
                    field: "Questions Asked",
                    ..
                }
            ));
        }
    }

    #[test]
    fn reviews_after_reference_load_with_negative_age() {
        let data = "Rating,Timestamp,Progress\n4.0,2021-02-12 00:00:00,10\n3.0,2021-02-01,50\n";
        let table = load_from_reader(data.as_bytes(), reference()).unwrap();
        let ages: Vec<i64> = table.reviews().iter().map(|r| r.age_in_days).collect();
        assert_eq!(ages, vec![-2, 9]);
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let data = "Rating,Timestamp,Progress\n4.0,yesterday,10\n";
        let err = load_from_reader(data.as_bytes(), reference()).unwrap_err();
        assert!(matches!(err, RatingError::InvalidTimestamp { row: 1, .. }));
    }

    #[test]
    fn timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2021, 1, 3)
            .and_then(|d| d.and_hms_opt(4, 5, 6))
            .unwrap();
        assert_eq!(parse_timestamp("2021-01-03 04:05:06"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-03T04:05:06"), Some(expected));
        assert_eq!(parse_timestamp(" 2021-01-03 04:05:06.000 "), Some(expected));
        assert_eq!(
            parse_timestamp("2021-01-03"),
            NaiveDate::from_ymd_opt(2021, 1, 3).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp("03.01.2021"), None);
    }
}
