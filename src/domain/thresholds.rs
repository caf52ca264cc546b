//! Warning threshold schedule and usage percentage math.

use serde::Serialize;

/// Ordered set of usage percentages at which warning notices fire.
///
/// Levels are kept sorted ascending and deduplicated; non-positive
/// entries are discarded at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThresholdSchedule {
    levels: Vec<i64>,
}

impl ThresholdSchedule {
    /// Builds a schedule from raw levels.
    #[must_use]
    pub fn new(mut levels: Vec<i64>) -> Self {
        levels.retain(|level| *level > 0);
        levels.sort_unstable();
        levels.dedup();
        Self { levels }
    }

    /// Parses a comma-separated list of levels, skipping entries that do
    /// not parse as integers.
    #[must_use]
    pub fn from_csv(csv: &str) -> Self {
        let levels = csv
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect();
        Self::new(levels)
    }

    /// Returns the levels, ascending.
    #[must_use]
    pub fn levels(&self) -> &[i64] {
        &self.levels
    }

    /// Returns the highest level crossed by moving from `prev_pct` to
    /// `current_pct`, if any.
    ///
    /// A level `t` counts as crossed when `prev_pct < t <= current_pct`.
    /// Jumping over several levels at once reports only the highest;
    /// sitting exactly on a level that was already reached reports
    /// nothing.
    #[must_use]
    pub fn highest_crossed(&self, prev_pct: i64, current_pct: i64) -> Option<i64> {
        self.levels
            .iter()
            .filter(|level| prev_pct < **level && **level <= current_pct)
            .last()
            .copied()
    }

    /// Integer usage percentage: `floor(100 * used / allowed)`.
    ///
    /// Callers guarantee `allowed > 0`; values above 100 are legitimate
    /// (overage).
    #[must_use]
    pub fn usage_percentage(compute_used: f64, compute_allowed: f64) -> i64 {
        (100.0 * compute_used / compute_allowed).floor() as i64
    }
}

impl Default for ThresholdSchedule {
    fn default() -> Self {
        Self::new(vec![20, 40, 80, 100])
    }
}
