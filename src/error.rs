use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("insufficient data in {dimension} bucket {bucket}: no ratings to average")]
    EmptyBucket {
        dimension: &'static str,
        bucket: String,
    },

    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("missing required field `{field}` in row {row}")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: `{field}` value {value} is not usable")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: f64,
    },

    #[error("{dimension} bucket {bucket} has a non-finite mean")]
    NonFiniteMean {
        dimension: &'static str,
        bucket: String,
    },

    #[error("row {row}: unparseable timestamp `{value}`")]
    InvalidTimestamp { row: usize, value: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
