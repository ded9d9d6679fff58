use clap::Args;
use rama::error::OpaqueError;
use serde::Serialize;

use crate::config::{
    Profile, Schedule, TrendStatSelection, parse_stage_list, parse_trend_stats,
};

#[derive(Debug, Clone, Args)]
/// validate and render a ramp schedule without issuing a single request
pub struct PlanCommand {
    /// preset ramp profile; a custom --stages list takes precedence
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// custom ramp stages as '<duration>:<target>,...' (e.g. '5s:100,45s:100')
    #[arg(long, value_parser = parse_stage_list)]
    stages: Option<Schedule>,

    /// trend stats for the end-of-run summary (e.g. 'min,avg,med,p(99)')
    #[arg(long, value_parser = parse_trend_stats)]
    summary_trend_stats: Option<TrendStatSelection>,

    /// print the plan as json
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct PlanStage {
    /// Offset into the run at which the stage begins, in seconds.
    at_s: f64,
    duration_s: f64,
    target: u64,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    stages: Vec<PlanStage>,
    total_duration_s: f64,
    peak_target: u64,
    summary_trend_stats: Vec<String>,
}

pub fn exec(args: PlanCommand) -> Result<(), OpaqueError> {
    let schedule = match args.stages {
        Some(schedule) => schedule,
        None => args.profile.unwrap_or_default().schedule(),
    };
    let selection = args.summary_trend_stats.unwrap_or_default();

    let plan = render(&schedule, &selection);

    if args.json {
        let rendered = serde_json::to_string_pretty(&plan).map_err(OpaqueError::from_std)?;
        println!("{rendered}");
        return Ok(());
    }

    println!("{:<6} {:>8} {:>10} {:>8}", "stage", "at", "duration", "target");
    for (idx, stage) in plan.stages.iter().enumerate() {
        println!(
            "{idx:<6} {:>7.1}s {:>9.1}s {:>8}",
            stage.at_s, stage.duration_s, stage.target,
        );
    }
    println!(
        "total: {:.1}s, peak: {} vus",
        plan.total_duration_s, plan.peak_target,
    );
    println!(
        "summary trend stats: {}",
        plan.summary_trend_stats.join(", "),
    );

    Ok(())
}

fn render(schedule: &Schedule, selection: &TrendStatSelection) -> PlanOutput {
    let mut at_s = 0.0;
    let stages = schedule
        .stages()
        .iter()
        .map(|stage| {
            let entry = PlanStage {
                at_s,
                duration_s: stage.duration.as_secs_f64(),
                target: stage.target,
            };
            at_s += stage.duration.as_secs_f64();
            entry
        })
        .collect();

    PlanOutput {
        stages,
        total_duration_s: schedule.total_duration().as_secs_f64(),
        peak_target: schedule.peak_target(),
        summary_trend_stats: selection.stats().iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_standard_profile() {
        let plan = render(
            &Profile::Standard.schedule(),
            &TrendStatSelection::default(),
        );

        assert_eq!(plan.stages.len(), 10);
        assert_eq!(plan.total_duration_s, 90.0);
        assert_eq!(plan.peak_target, 500);

        // Cumulative offsets follow the declared stage order.
        assert_eq!(plan.stages[0].at_s, 0.0);
        assert_eq!(plan.stages[5].at_s, 25.0);
        assert_eq!(plan.stages[6].at_s, 70.0);

        assert_eq!(
            plan.summary_trend_stats,
            vec!["min", "avg", "med", "p(99)", "p(99.9)", "p(99.99)"]
        );
    }

    #[test]
    fn renders_custom_stages() {
        let schedule = parse_stage_list("10s:50,30s:50").expect("parse stage list");
        let selection = parse_trend_stats("max").expect("parse selection");
        let plan = render(&schedule, &selection);

        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.total_duration_s, 40.0);
        assert_eq!(plan.peak_target, 50);
        assert_eq!(plan.summary_trend_stats, vec!["max"]);
    }

    #[test]
    fn plan_json_is_serializable() {
        let plan = render(
            &Profile::Extended.schedule(),
            &TrendStatSelection::default(),
        );
        let rendered = serde_json::to_string(&plan).expect("serialize plan");
        assert!(rendered.contains("\"peak_target\":1000"));
    }
}
