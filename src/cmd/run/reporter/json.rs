use std::time::Duration;

use crate::config::{TrendStatSelection, TrendSummary};

use super::{Counters, FailureKind, Reporter, RequestResultEvent, human::HumanReporter};

pub struct JsonlReporter {
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    selection: TrendStatSelection,
    latencies: Vec<Duration>,
    emit_events: bool,
}

impl JsonlReporter {
    pub fn new(interval: Duration, selection: TrendStatSelection, emit_events: bool) -> Self {
        Self {
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            selection,
            latencies: Vec::new(),
            emit_events,
        }
    }

    fn counters_json(c: &Counters) -> serde_json::Value {
        serde_json::json!({
            "total": c.total,
            "ok": c.ok,
            "http_fail": c.http_fail,
            "other_fail": c.other_fail,
        })
    }
}

impl Reporter for JsonlReporter {
    fn on_result(&mut self, ev: &RequestResultEvent) {
        HumanReporter::apply_counts(&mut self.interval_counts, ev);
        HumanReporter::apply_counts(&mut self.total_counts, ev);
        self.latencies.push(ev.latency);

        if self.emit_events {
            let line = serde_json::json!({
                "type": "event",
                "t_ms": ev.elapsed.as_millis(),
                "vu": ev.vu,
                "iteration": ev.iteration,
                "latency_ms": ev.latency.as_millis(),
                "ok": ev.outcome.ok,
                "status": ev.outcome.status,
                "failure": match ev.outcome.failure {
                    Some(FailureKind::HttpStatus) => Some("http_status"),
                    Some(FailureKind::Other) => Some("other"),
                    None => None,
                },
            });
            println!("{line}");
        }
    }

    fn on_tick(&mut self, now: Duration, active_vus: usize) {
        if now.saturating_sub(self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;

        let interval_secs = self.interval.as_secs_f64();
        let rps = if interval_secs == 0. {
            0.
        } else {
            self.interval_counts.total as f64 / interval_secs
        };

        let line = serde_json::json!({
            "type": "summary",
            "t_ms": now.as_millis(),
            "vus": active_vus,
            "interval_ms": self.interval.as_millis(),
            "rps": rps,
            "interval": Self::counters_json(&self.interval_counts),
            "total": Self::counters_json(&self.total_counts),
        });
        println!("{line}");

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self) {
        let summary = TrendSummary::compute(&self.latencies, &self.selection);
        let mut trend = serde_json::Map::new();
        for (stat, value) in summary.entries() {
            trend.insert(
                stat.to_string(),
                serde_json::json!(value.as_secs_f64() * 1e3),
            );
        }

        let line = serde_json::json!({
            "type": "final",
            "total": Self::counters_json(&self.total_counts),
            "http_req_duration_ms": trend,
        });
        println!("{line}");
    }
}
