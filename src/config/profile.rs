use std::time::Duration;

use super::{Schedule, Stage};

/// Preset ramp profiles.
/// Each profile is a complete schedule the run command can execute as-is.
#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
pub enum Profile {
    /// Ramp to 500 VUs in five steps, hold for 45s, ramp back down.
    /// The default profile for a locally served target.
    #[default]
    Standard,

    /// Ramp to 1000 VUs in ten steps, hold for 85s, ramp back down.
    /// Used to probe saturation beyond the standard profile.
    Extended,
}

/// Duration of every ramp step outside the hold stage.
const STEP: Duration = Duration::from_secs(5);

impl Profile {
    /// Construct the concrete ramp schedule associated with this profile.
    pub fn schedule(self) -> Schedule {
        let stages = match self {
            Profile::Standard => staircase(500, 100, Duration::from_secs(45)),
            Profile::Extended => staircase(1000, 100, Duration::from_secs(85)),
        };

        Schedule::try_new(stages).expect("profile schedules are non-empty with non-zero durations")
    }
}

/// Symmetric staircase: `step`-sized increments up to `peak`, a hold
/// stage at the top, then the same increments back down.
fn staircase(peak: u64, step: u64, hold: Duration) -> Vec<Stage> {
    let steps = peak / step;

    let mut stages: Vec<Stage> = (1..=steps)
        .map(|i| Stage {
            duration: STEP,
            target: i * step,
        })
        .collect();

    stages.push(Stage {
        duration: hold,
        target: peak,
    });

    stages.extend((1..steps).rev().map(|i| Stage {
        duration: STEP,
        target: i * step,
    }));

    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_profile_matches_expected_ramp() {
        let schedule = Profile::Standard.schedule();

        let expected: Vec<(u64, u64)> = vec![
            (5, 100),
            (5, 200),
            (5, 300),
            (5, 400),
            (5, 500),
            (45, 500),
            (5, 400),
            (5, 300),
            (5, 200),
            (5, 100),
        ];

        let actual: Vec<(u64, u64)> = schedule
            .stages()
            .iter()
            .map(|stage| (stage.duration.as_secs(), stage.target))
            .collect();

        assert_eq!(actual, expected);
        assert_eq!(schedule.stages().len(), 10);
        assert_eq!(schedule.total_duration(), Duration::from_secs(90));
        assert_eq!(schedule.peak_target(), 500);
    }

    #[test]
    fn extended_profile_reaches_1000_with_long_hold() {
        let schedule = Profile::Extended.schedule();

        assert_eq!(schedule.stages().len(), 20);
        assert_eq!(schedule.peak_target(), 1000);

        // 10 steps up + 9 steps down at 5s each, plus the 85s hold.
        assert_eq!(schedule.total_duration(), Duration::from_secs(180));

        let hold = schedule.stages()[10];
        assert_eq!(hold.duration, Duration::from_secs(85));
        assert_eq!(hold.target, 1000);
    }
}
