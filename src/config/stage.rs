use std::{fmt, str::FromStr, time::Duration};

use rama::error::{ErrorContext as _, OpaqueError};

/// A single ramp step: over `duration` the scheduler moves the active
/// virtual-user count towards `target`.
///
/// Steps are declarative data, constructed once at startup and never
/// mutated by the workload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Wall-clock time this step spans.
    pub duration: Duration,
    /// Desired concurrent virtual-user count at the end of the step.
    pub target: u64,
}

impl FromStr for Stage {
    type Err = OpaqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .context("stage must be formatted as '<duration>:<target>' (e.g. '5s:100')")?;

        let duration = humantime::parse_duration(duration.trim()).context("parse stage duration")?;
        let target = target.trim().parse::<u64>().context("parse stage target")?;

        Ok(Self { duration, target })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", humantime::format_duration(self.duration), self.target)
    }
}

/// An ordered, non-empty sequence of [`Stage`]s.
///
/// The order is significant: it defines the ramp shape over time.
/// Read-only for the life of the run once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    stages: Vec<Stage>,
}

impl Schedule {
    pub fn try_new(stages: Vec<Stage>) -> Result<Self, OpaqueError> {
        if stages.is_empty() {
            return Err(OpaqueError::from_display(
                "a schedule requires at least one stage",
            ));
        }

        if let Some(stage) = stages.iter().find(|stage| stage.duration.is_zero()) {
            return Err(OpaqueError::from_display(format!(
                "stage '{stage}' has a zero duration and can never be reached",
            )));
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Sum of all stage durations: the total run time.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    /// Highest target the ramp reaches.
    pub fn peak_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .max()
            .unwrap_or_default()
    }

    /// Desired virtual-user count `elapsed` into the run.
    ///
    /// Within a stage the count is linearly interpolated from the previous
    /// stage's target (0 before the first stage) towards the stage's own
    /// target. Past the end of the schedule the final target holds.
    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let mut from = 0u64;
        let mut offset = Duration::ZERO;

        for stage in &self.stages {
            let end = offset + stage.duration;
            if elapsed < end {
                let progress =
                    (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
                let from = from as f64;
                let to = stage.target as f64;
                return (from + (to - from) * progress).round() as u64;
            }

            from = stage.target;
            offset = end;
        }

        from
    }
}

/// Parse a comma separated stage list (e.g. '5s:100,45s:100,5s:0').
///
/// Used as a clap value parser, hence the stringly error.
pub fn parse_stage_list(input: &str) -> Result<Schedule, String> {
    let result: Result<Vec<Stage>, _> = input.split(',').map(|s| s.parse()).collect();
    match result {
        Ok(stages) => Schedule::try_new(stages).map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    }
}
