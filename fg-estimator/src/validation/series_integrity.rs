//! Integrity checks for raw input series.
//!
//! Validates:
//! - Coverage (series is not empty)
//! - Finite values (NaN / infinite observations are reported, not fatal)
//! - Date continuity (no gap longer than a week)
//! - Business-day calendar (no weekend observations)
//! - Positive levels for inputs used in ratios and returns

use chrono::{Datelike, Weekday};

use crate::data::{InputKey, InputSet, Series};

/// Longest tolerated calendar gap between consecutive observations.
pub const MAX_GAP_DAYS: i64 = 7;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Integrity report for one input series.
#[derive(Debug, Clone)]
pub struct SeriesIntegrityReport {
    pub input: InputKey,
    pub observations: usize,
    pub non_finite: usize,
    pub checks: Vec<CheckResult>,
}

impl SeriesIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} ({} observations, {} non-finite): {}/{} checks passed",
            self.input,
            self.observations,
            self.non_finite,
            passed,
            self.checks.len()
        )
    }
}

/// Validator for raw input series.
#[derive(Debug, Default)]
pub struct SeriesIntegrityValidator;

impl SeriesIntegrityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run all checks on one input series.
    pub fn validate(&self, input: InputKey, series: &Series) -> SeriesIntegrityReport {
        let mut checks = vec![
            self.check_coverage(series),
            self.check_finite_values(series),
            self.check_date_continuity(series),
            self.check_business_days(series),
        ];
        if requires_positive_levels(input) {
            checks.push(self.check_positive_levels(series));
        }

        SeriesIntegrityReport {
            input,
            observations: series.len(),
            non_finite: series.non_finite_count(),
            checks,
        }
    }

    /// Validate every series of an input set, in key order.
    pub fn validate_all(&self, inputs: &InputSet) -> Vec<SeriesIntegrityReport> {
        inputs
            .iter()
            .map(|(key, series)| self.validate(key, series))
            .collect()
    }

    fn check_coverage(&self, series: &Series) -> CheckResult {
        match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) => CheckResult::pass(
                "coverage",
                &format!("{} observations from {} to {}", series.len(), first, last),
            ),
            _ => CheckResult::fail("coverage", "Series has no observations", None),
        }
    }

    fn check_finite_values(&self, series: &Series) -> CheckResult {
        let bad: Vec<_> = series.iter().filter(|p| !p.is_finite()).collect();
        if bad.is_empty() {
            return CheckResult::pass("finite_values", "All values finite");
        }

        let sample: Vec<String> = bad.iter().take(5).map(|p| p.date.to_string()).collect();
        CheckResult::fail(
            "finite_values",
            &format!("{} non-finite values (treated as missing)", bad.len()),
            Some(format!("First dates: {}", sample.join(", "))),
        )
    }

    fn check_date_continuity(&self, series: &Series) -> CheckResult {
        let gaps: Vec<String> = series
            .points()
            .windows(2)
            .filter_map(|w| {
                let days = (w[1].date - w[0].date).num_days();
                (days > MAX_GAP_DAYS).then(|| format!("{} to {} ({} days)", w[0].date, w[1].date, days))
            })
            .collect();

        if gaps.is_empty() {
            CheckResult::pass("date_continuity", "No major gaps")
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} major gaps found", gaps.len()),
                Some(gaps.join(", ")),
            )
        }
    }

    fn check_business_days(&self, series: &Series) -> CheckResult {
        let weekend = series
            .iter()
            .filter(|p| matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun))
            .count();

        if weekend == 0 {
            CheckResult::pass("business_days", "No weekend observations")
        } else {
            CheckResult::fail(
                "business_days",
                &format!("{} weekend observations", weekend),
                None,
            )
        }
    }

    fn check_positive_levels(&self, series: &Series) -> CheckResult {
        let non_positive = series
            .iter()
            .filter(|p| p.is_finite() && p.value <= 0.0)
            .count();

        if non_positive == 0 {
            CheckResult::pass("positive_levels", "All levels positive")
        } else {
            CheckResult::fail(
                "positive_levels",
                &format!("{} non-positive levels", non_positive),
                None,
            )
        }
    }
}

/// Inputs whose levels feed ratios or returns and must stay positive.
fn requires_positive_levels(input: InputKey) -> bool {
    matches!(
        input,
        InputKey::Equity
            | InputKey::Volatility
            | InputKey::Breadth
            | InputKey::Treasury
            | InputKey::HighYield
    )
}
