//! Grade statistics.
//!
//! Works are bucketed by the calendar date of their date-key and each bucket
//! is summarised with population statistics.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{WORK_DATE_FORMAT, Work};
use crate::error::StatsError;

/// Aggregate statistics for one set of grades
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub std: f64,
}

/// Stats keyed by `YYYY-MM-DD`
pub type DateStats = BTreeMap<String, Stats>;

/// Grades grouped by `YYYY-MM-DD`
#[derive(Debug, Default)]
pub struct GradeBuckets {
    by_date: BTreeMap<String, Vec<f64>>,
}

impl GradeBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every work of one portfolio; a single unparseable key fails the batch
    pub fn add_portfolio<'a>(
        &mut self,
        works: impl IntoIterator<Item = (&'a String, &'a Work)>,
    ) -> Result<(), StatsError> {
        for (key, work) in works {
            let date = NaiveDateTime::parse_from_str(key, WORK_DATE_FORMAT)
                .map_err(|_| StatsError::InvalidDateKey { key: key.clone() })?
                .format("%Y-%m-%d")
                .to_string();
            self.by_date
                .entry(date)
                .or_default()
                .push(work.grading_outcome.total_grade);
        }
        Ok(())
    }

    pub fn compute(&self) -> Result<DateStats, StatsError> {
        self.by_date
            .iter()
            .map(|(date, values)| {
                compute_stats(values)
                    .map(|stats| (date.clone(), stats))
                    .map_err(|_| StatsError::DateBucket { date: date.clone() })
            })
            .collect()
    }
}

/// Mean, extremes and population standard deviation
pub fn compute_stats(values: &[f64]) -> Result<Stats, StatsError> {
    let (&first, _) = values.split_first().ok_or(StatsError::NoValues)?;
    let n = values.len() as f64;

    let (min, max, sum) = values
        .iter()
        .fold((first, first, 0.0), |(min, max, sum), &v| {
            (min.min(v), max.max(v), sum + v)
        });
    let avg = sum / n;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n;

    Ok(Stats {
        avg,
        max,
        min,
        std: variance.sqrt(),
    })
}
