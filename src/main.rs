use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};

mod error;
mod loader;
mod logging;
mod models;
mod rating;
mod report;

use crate::models::{BlendWeights, ReviewTable, Weights};
use crate::report::FormatOptions;

#[derive(Parser)]
#[command(name = "course-rating")]
#[command(about = "Time and progress weighted course ratings from review exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Review export with Rating, Timestamp and Progress columns
    #[arg(long, env = "COURSE_RATING_CSV")]
    csv: PathBuf,
    /// Point in time review ages are measured from
    #[arg(long, default_value = "2021-02-10 00:00:00", value_parser = parse_reference)]
    reference_date: NaiveDateTime,
    /// Digits after the decimal point in printed scores
    #[arg(long, default_value_t = 5)]
    precision: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Print descriptive statistics and all weighted scores
    Summary {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        json: bool,
    },
    /// Weighted average over rating recency buckets
    Time {
        #[command(flatten)]
        source: Source,
        #[arg(long, num_args = 4, value_names = ["W1", "W2", "W3", "W4"])]
        weights: Option<Vec<f64>>,
    },
    /// Weighted average over course progress buckets
    User {
        #[command(flatten)]
        source: Source,
        #[arg(long, num_args = 4, value_names = ["W1", "W2", "W3", "W4"])]
        weights: Option<Vec<f64>>,
    },
    /// Blend of the time and user weighted averages
    Course {
        #[command(flatten)]
        source: Source,
        #[arg(long, default_value_t = 50.0)]
        time_weight: f64,
        #[arg(long, default_value_t = 50.0)]
        user_weight: f64,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: Source,
        #[arg(long, default_value_t = 50.0)]
        time_weight: f64,
        #[arg(long, default_value_t = 50.0)]
        user_weight: f64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_reference(value: &str) -> Result<NaiveDateTime, String> {
    loader::parse_timestamp(value).ok_or_else(|| format!("unrecognised date `{value}`"))
}

fn load(source: &Source) -> anyhow::Result<ReviewTable> {
    loader::load_from_path(&source.csv, source.reference_date)
        .with_context(|| format!("failed to load reviews from {}", source.csv.display()))
}

fn weights_or(values: Option<Vec<f64>>, default: Weights) -> Weights {
    match values.as_deref() {
        Some(&[w1, w2, w3, w4]) => Weights::new(w1, w2, w3, w4),
        _ => default,
    }
}

fn main() -> anyhow::Result<()> {
    logging::init_tracing("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { source, json } => {
            let table = load(&source)?;
            let summary = report::summarize(&table, BlendWeights::default());
            if json {
                println!("{}", report::to_json(&summary)?);
            } else {
                let options = FormatOptions {
                    precision: source.precision,
                };
                print!("{}", report::build_summary_text(&summary, options));
            }
        }
        Commands::Time { source, weights } => {
            let table = load(&source)?;
            let weights = weights_or(weights, Weights::TIME_DEFAULT);
            let score = rating::time_based_weighted_average(&table, &weights)?;
            println!("{:.*}", source.precision, score);
        }
        Commands::User { source, weights } => {
            let table = load(&source)?;
            let weights = weights_or(weights, Weights::PROGRESS_DEFAULT);
            let score = rating::user_based_weighted_average(&table, &weights)?;
            println!("{:.*}", source.precision, score);
        }
        Commands::Course {
            source,
            time_weight,
            user_weight,
        } => {
            let table = load(&source)?;
            let score = rating::course_weighted_rating(&table, time_weight, user_weight)?;
            println!("{:.*}", source.precision, score);
        }
        Commands::Report {
            source,
            time_weight,
            user_weight,
            out,
        } => {
            let table = load(&source)?;
            let blend = BlendWeights {
                time: time_weight,
                user: user_weight,
            };
            let summary = report::summarize(&table, blend);
            let options = FormatOptions {
                precision: source.precision,
            };
            std::fs::write(&out, report::build_report(&summary, options))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_custom_time_weights() {
        let cli = Cli::try_parse_from([
            "course-rating",
            "time",
            "--csv",
            "reviews.csv",
            "--weights",
            "30",
            "26",
            "22",
            "22",
        ])
        .unwrap();
        match cli.command {
            Commands::Time { source, weights } => {
                assert_eq!(source.csv, PathBuf::from("reviews.csv"));
                assert_eq!(
                    weights_or(weights, Weights::TIME_DEFAULT),
                    Weights::new(30.0, 26.0, 22.0, 22.0)
                );
                assert_eq!(source.reference_date.to_string(), "2021-02-10 00:00:00");
            }
            _ => panic!("expected time command"),
        }
    }

    #[test]
    fn course_defaults_to_even_blend() {
        let cli = Cli::try_parse_from([
            "course-rating",
            "course",
            "--csv",
            "reviews.csv",
            "--reference-date",
            "2021-03-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Course {
                source,
                time_weight,
                user_weight,
            } => {
                assert_eq!(time_weight, 50.0);
                assert_eq!(user_weight, 50.0);
                assert_eq!(source.reference_date.to_string(), "2021-03-01 00:00:00");
            }
            _ => panic!("expected course command"),
        }
    }
}
