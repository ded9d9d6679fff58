use std::{fmt, str::FromStr, time::Duration};

use rama::error::{ErrorContext as _, OpaqueError};

/// One aggregate statistic over observed request latencies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendStat {
    Min,
    Avg,
    Med,
    Max,
    /// Percentile within `0..=100`, e.g. `p(99.9)`.
    Percentile(f64),
}

impl fmt::Display for TrendStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => f.write_str("min"),
            Self::Avg => f.write_str("avg"),
            Self::Med => f.write_str("med"),
            Self::Max => f.write_str("max"),
            Self::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

impl FromStr for TrendStat {
    type Err = OpaqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" => Ok(Self::Min),
            "avg" => Ok(Self::Avg),
            "med" => Ok(Self::Med),
            "max" => Ok(Self::Max),
            other => {
                let inner = other
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .context("unknown trend stat, expected min/avg/med/max/p(..)")?;

                let p: f64 = inner.parse().context("parse percentile value")?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(OpaqueError::from_display(
                        "percentile must be within 0..=100",
                    ));
                }

                Ok(Self::Percentile(p))
            }
        }
    }
}

/// Ordered set of trend stats to include in the end-of-run summary.
///
/// Shapes report formatting only; it never affects what is measured.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendStatSelection(Vec<TrendStat>);

impl TrendStatSelection {
    pub fn try_new(stats: Vec<TrendStat>) -> Result<Self, OpaqueError> {
        if stats.is_empty() {
            return Err(OpaqueError::from_display(
                "at least one trend stat is required",
            ));
        }

        for (idx, stat) in stats.iter().enumerate() {
            if stats[..idx].contains(stat) {
                return Err(OpaqueError::from_display(format!(
                    "duplicate trend stat: {stat}",
                )));
            }
        }

        Ok(Self(stats))
    }

    pub fn stats(&self) -> &[TrendStat] {
        &self.0
    }
}

impl Default for TrendStatSelection {
    fn default() -> Self {
        Self(vec![
            TrendStat::Min,
            TrendStat::Avg,
            TrendStat::Med,
            TrendStat::Percentile(99.0),
            TrendStat::Percentile(99.9),
            TrendStat::Percentile(99.99),
        ])
    }
}

impl fmt::Display for TrendStatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, stat) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            stat.fmt(f)?;
        }
        Ok(())
    }
}

/// Parse a comma separated trend stat list (e.g. 'min,avg,med,p(99)').
///
/// Used as a clap value parser, hence the stringly error.
pub fn parse_trend_stats(input: &str) -> Result<TrendStatSelection, String> {
    let result: Result<Vec<TrendStat>, _> = input.split(',').map(|s| s.parse()).collect();
    match result {
        Ok(stats) => TrendStatSelection::try_new(stats).map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    }
}

/// Aggregates computed over a latency sample: one value per selected stat,
/// in selection order.
#[derive(Debug, Clone)]
pub struct TrendSummary(Vec<(TrendStat, Duration)>);

impl TrendSummary {
    /// Compute the selected aggregates over `latencies`.
    ///
    /// Percentiles use nearest-rank over a sorted copy of the sample.
    /// An empty sample yields a zero duration for every selected stat.
    pub fn compute(latencies: &[Duration], selection: &TrendStatSelection) -> Self {
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let value = |stat: TrendStat| -> Duration {
            let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
                return Duration::ZERO;
            };

            match stat {
                TrendStat::Min => *first,
                TrendStat::Max => *last,
                TrendStat::Avg => {
                    sorted.iter().sum::<Duration>() / sorted.len() as u32
                }
                TrendStat::Med => percentile(&sorted, 50.0),
                TrendStat::Percentile(p) => percentile(&sorted, p),
            }
        };

        Self(
            selection
                .stats()
                .iter()
                .map(|&stat| (stat, value(stat)))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[(TrendStat, Duration)] {
        &self.0
    }
}

/// Nearest-rank percentile of a non-empty sorted sample.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
