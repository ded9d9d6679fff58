use std::time::Duration;

use crate::config::{TrendStatSelection, TrendSummary};

use super::{Counters, FailureKind, Reporter, RequestResultEvent};

pub struct HumanReporter {
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    selection: TrendStatSelection,
    latencies: Vec<Duration>,
}

impl HumanReporter {
    pub fn new(interval: Duration, selection: TrendStatSelection) -> Self {
        Self {
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            selection,
            latencies: Vec::new(),
        }
    }

    pub(super) fn apply_counts(c: &mut Counters, ev: &RequestResultEvent) {
        c.total += 1;
        if ev.outcome.ok {
            c.ok += 1;
            return;
        }
        match ev.outcome.failure {
            Some(FailureKind::HttpStatus) => c.http_fail += 1,
            _ => c.other_fail += 1,
        }
    }

    pub(super) fn format_latency(d: Duration) -> String {
        format!("{:.2}ms", d.as_secs_f64() * 1e3)
    }
}

impl Reporter for HumanReporter {
    fn on_result(&mut self, ev: &RequestResultEvent) {
        Self::apply_counts(&mut self.interval_counts, ev);
        Self::apply_counts(&mut self.total_counts, ev);
        self.latencies.push(ev.latency);
    }

    fn on_tick(&mut self, now: Duration, active_vus: usize) {
        if now.saturating_sub(self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;

        let rps = self.interval_counts.total as f64 / self.interval.as_secs_f64();

        println!(
            "t={:.1}s vus={} rps={:.1} ok={} http_fail={} other_fail={} total_ok={} total_fail={}",
            now.as_secs_f64(),
            active_vus,
            rps,
            self.interval_counts.ok,
            self.interval_counts.http_fail,
            self.interval_counts.other_fail,
            self.total_counts.ok,
            self.total_counts.total - self.total_counts.ok,
        );

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self) {
        println!(
            "done ok={} http_fail={} other_fail={} total={}",
            self.total_counts.ok,
            self.total_counts.http_fail,
            self.total_counts.other_fail,
            self.total_counts.total,
        );

        let summary = TrendSummary::compute(&self.latencies, &self.selection);
        let stats: Vec<String> = summary
            .entries()
            .iter()
            .map(|(stat, value)| format!("{stat}={}", Self::format_latency(*value)))
            .collect();
        println!("http_req_duration: {}", stats.join(" "));
    }
}
