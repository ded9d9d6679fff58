use std::time::Duration;

use rama::{
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::{Response, Uri},
    net::address::SocketAddress,
    rt::Executor,
    telemetry::tracing,
};

use clap::Args;
use tokio::{
    sync::{
        mpsc::{self, Receiver},
        oneshot, watch,
    },
    time::{self, Instant},
};

use crate::config::{
    Profile, Schedule, TrendStatSelection, parse_stage_list, parse_trend_stats,
};

mod client;
pub mod reporter;
mod vu;

use self::{
    reporter::{
        FailureKind, HumanReporter, JsonlReporter, Reporter, RequestOutcome, RequestResultEvent,
    },
    vu::{IterationResult, VuPool},
};

#[derive(Debug, Clone, Args)]
/// run the staged load against a target
pub struct RunCommand {
    /// socket address of the target server
    #[arg(value_name = "ADDRESS", default_value = "127.0.0.1:8000")]
    target: SocketAddress,

    /// report json lines instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,

    /// preset ramp profile; a custom --stages list takes precedence
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// custom ramp stages as '<duration>:<target>,...' (e.g. '5s:100,45s:100')
    #[arg(long, value_parser = parse_stage_list)]
    stages: Option<Schedule>,

    /// trend stats for the end-of-run summary (e.g. 'min,avg,med,p(99)')
    #[arg(long, value_parser = parse_trend_stats)]
    summary_trend_stats: Option<TrendStatSelection>,

    /// how often the scheduler re-evaluates the desired VU count
    #[arg(long, value_name = "SECONDS", default_value_t = 0.1)]
    tick: f64,
}

pub async fn exec(guard: ShutdownGuard, args: RunCommand) -> Result<(), OpaqueError> {
    let schedule = resolve_schedule(args.profile, args.stages);
    let selection = args.summary_trend_stats.unwrap_or_default();

    let uri: Uri = format!("http://{}/", args.target)
        .parse()
        .context("build target uri")?;

    tracing::info!(
        target = %uri,
        stages = schedule.stages().len(),
        peak_vus = schedule.peak_target(),
        total = %humantime::format_duration(schedule.total_duration()),
        summary_trend_stats = %selection,
        "ramp schedule resolved",
    );

    let client = self::client::http_client(Executor::graceful(guard.clone()));

    const REPORT_INTERVAL: Duration = Duration::from_secs(1);

    let reporter: Box<dyn Reporter> = if args.json {
        const EMIT_EVENTS: bool = true;
        Box::new(JsonlReporter::new(REPORT_INTERVAL, selection, EMIT_EVENTS))
    } else {
        Box::new(HumanReporter::new(REPORT_INTERVAL, selection))
    };

    let channel_capacity = (schedule.peak_target() as usize).max(1) * 8;
    let (result_tx, result_rx) = mpsc::channel(channel_capacity);
    let (active_tx, active_rx) = watch::channel(0usize);
    let (done_tx, done_rx) = oneshot::channel();

    guard.spawn_task_fn(|guard| report_worker(guard, reporter, result_rx, active_rx, done_tx));

    let mut pool = VuPool::new(client, uri, result_tx);

    let started = Instant::now();
    let total = schedule.total_duration();
    let mut ticker = time::interval(Duration::from_secs_f64(args.tick.clamp(0.001, 10.)));
    let mut cancelled = std::pin::pin!(guard.clone_weak().into_cancelled());

    loop {
        tokio::select! {
            _ = cancelled.as_mut() => {
                tracing::error!("exit ramp scheduler early: guard shutdown");
                break;
            }
            _ = ticker.tick() => {}
        }

        let elapsed = started.elapsed();
        if elapsed >= total {
            tracing::debug!("ramp schedule exhausted: stop all virtual users");
            break;
        }

        let target = schedule.target_at(elapsed) as usize;
        if target != pool.active() {
            tracing::debug!(
                elapsed = %humantime::format_duration(Duration::from_secs(elapsed.as_secs())),
                active = pool.active(),
                %target,
                "adjust virtual user count",
            );
            pool.scale_to(target, &guard);
        }

        let _ = active_tx.send(pool.active());
    }

    pool.stop_all();
    // Dropping the pool releases the last result sender held by the
    // scheduler; the report worker finishes once all VU tasks wind down.
    drop(pool);

    let _ = done_rx.await;
    Ok(())
}

fn resolve_schedule(profile: Option<Profile>, stages: Option<Schedule>) -> Schedule {
    match stages {
        Some(schedule) => {
            if profile.is_some() {
                tracing::info!("custom stages take precedence over the profile");
            }
            schedule
        }
        None => {
            let profile = profile.unwrap_or_default();
            tracing::info!("use profile schedule: {profile:?}");
            profile.schedule()
        }
    }
}

async fn report_worker(
    guard: ShutdownGuard,
    mut reporter: Box<dyn Reporter>,
    mut result_rx: Receiver<IterationResult>,
    active_rx: watch::Receiver<usize>,
    done_tx: oneshot::Sender<()>,
) {
    let start = Instant::now();

    loop {
        let IterationResult {
            result,
            req_start,
            vu,
            iteration,
        } = tokio::select! {
            _ = guard.cancelled() => {
                tracing::debug!("exit report worker: guard shutdown");
                break;
            }

            maybe_result = result_rx.recv() => {
                let Some(result) = maybe_result else {
                    tracing::debug!("result senders closed: finalize report");
                    break;
                };

                result
            }
        };

        let ev = RequestResultEvent {
            ts: std::time::SystemTime::now(),
            elapsed: start.elapsed(),
            vu,
            iteration,
            latency: req_start.elapsed(),
            outcome: classify_outcome(result),
        };

        reporter.on_result(&ev);
        reporter.on_tick(start.elapsed(), *active_rx.borrow());
    }

    reporter.finish();
    let _ = done_tx.send(());
}

/// Classify a finished iteration for the run's failure accounting.
///
/// Success and redirect statuses count as ok: the workload never
/// follows redirects, yet the target did answer. Everything else is an
/// http failure; transport errors never carry a status.
fn classify_outcome(result: Result<Response, OpaqueError>) -> RequestOutcome {
    match result {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if (200..400).contains(&status) {
                RequestOutcome {
                    ok: true,
                    status: Some(status),
                    failure: None,
                }
            } else {
                RequestOutcome {
                    ok: false,
                    status: Some(status),
                    failure: Some(FailureKind::HttpStatus),
                }
            }
        }
        Err(err) => {
            tracing::debug!("non-http error: {err}");
            RequestOutcome {
                ok: false,
                status: None,
                failure: Some(FailureKind::Other),
            }
        }
    }
}
