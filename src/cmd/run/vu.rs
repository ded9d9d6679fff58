use rama::{
    error::OpaqueError,
    graceful::ShutdownGuard,
    http::{Request, Response, Uri},
    service::BoxService,
    telemetry::tracing,
};

use tokio::{
    sync::{mpsc::Sender, watch},
    time::Instant,
};

use crate::workload;

/// Raw result of a single workload iteration, as produced by a VU task.
pub(super) struct IterationResult {
    pub(super) result: Result<Response, OpaqueError>,
    pub(super) req_start: Instant,
    pub(super) vu: usize,
    pub(super) iteration: usize,
}

/// Pool of virtual-user tasks, resized by the ramp scheduler.
///
/// Scale-down stops the most recently started VUs first, so VU ids stay
/// dense from zero. Each VU owns nothing but its stop signal; results
/// flow through the shared channel.
pub(super) struct VuPool {
    client: BoxService<Request, Response, OpaqueError>,
    uri: Uri,
    result_tx: Sender<IterationResult>,
    vus: Vec<watch::Sender<bool>>,
}

impl VuPool {
    pub(super) fn new(
        client: BoxService<Request, Response, OpaqueError>,
        uri: Uri,
        result_tx: Sender<IterationResult>,
    ) -> Self {
        Self {
            client,
            uri,
            result_tx,
            vus: Vec::new(),
        }
    }

    pub(super) fn active(&self) -> usize {
        self.vus.len()
    }

    /// Resize the pool to `target` VU tasks.
    pub(super) fn scale_to(&mut self, target: usize, guard: &ShutdownGuard) {
        while self.vus.len() < target {
            let vu = self.vus.len();
            let (stop_tx, stop_rx) = watch::channel(false);

            let client = self.client.clone();
            let uri = self.uri.clone();
            let result_tx = self.result_tx.clone();
            guard.spawn_task_fn(move |guard| {
                vu_loop(guard, vu, client, uri, result_tx, stop_rx)
            });

            self.vus.push(stop_tx);
        }

        while self.vus.len() > target {
            if let Some(stop_tx) = self.vus.pop() {
                let _ = stop_tx.send(true);
            }
        }
    }

    pub(super) fn stop_all(&mut self) {
        while let Some(stop_tx) = self.vus.pop() {
            let _ = stop_tx.send(true);
        }
    }
}

/// One virtual user: run the workload in a loop until stopped.
///
/// Iterations are independent; the only shared state is the result
/// channel. A full channel paces the VU instead of dropping samples.
async fn vu_loop(
    guard: ShutdownGuard,
    vu: usize,
    client: BoxService<Request, Response, OpaqueError>,
    uri: Uri,
    result_tx: Sender<IterationResult>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut iteration = 0;

    loop {
        if *stop_rx.borrow() {
            tracing::trace!(%vu, "vu stopped by scheduler");
            return;
        }

        let req_start = Instant::now();
        let result = tokio::select! {
            _ = guard.cancelled() => {
                tracing::trace!(%vu, "vu stopped: guard shutdown");
                return;
            }
            _ = stop_rx.changed() => {
                continue;
            }
            result = workload::run_iteration(&client, &uri) => result,
        };

        if result_tx
            .send(IterationResult {
                result,
                req_start,
                vu,
                iteration,
            })
            .await
            .is_err()
        {
            tracing::debug!(%vu, "result channel closed: stop vu");
            return;
        }

        iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use rama::{
        Service,
        graceful::Shutdown,
        http::{StatusCode, service::web::response::IntoResponse},
    };
    use tokio::sync::mpsc;

    use super::*;

    #[derive(Debug, Default, Clone)]
    struct CountingService {
        calls: Arc<AtomicUsize>,
    }

    impl Service<Request> for CountingService {
        type Output = Response;
        type Error = OpaqueError;

        async fn serve(&self, _req: Request) -> Result<Self::Output, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StatusCode::OK.into_response())
        }
    }

    fn target() -> Uri {
        Uri::from_static("http://127.0.0.1:8000/")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pool_scales_up_and_down() {
        let shutdown = Shutdown::new(std::future::pending::<()>());
        let guard = shutdown.guard();

        let svc = CountingService::default();
        let calls = svc.calls.clone();

        let (result_tx, mut result_rx) = mpsc::channel(4);
        let mut pool = VuPool::new(svc.boxed(), target(), result_tx);

        pool.scale_to(3, &guard);
        assert_eq!(pool.active(), 3);

        // Drain a few results so the VU tasks make progress.
        let mut results = Vec::new();
        for _ in 0..9 {
            results.push(result_rx.recv().await.expect("vu result"));
        }

        let seen_vus: HashSet<usize> = results.iter().map(|r| r.vu).collect();
        assert!(seen_vus.iter().all(|vu| *vu < 3));
        assert!(results.iter().all(|r| r.result.is_ok()));
        // At least one VU must have looped beyond its first iteration.
        assert!(results.iter().any(|r| r.iteration >= 1));
        assert!(calls.load(Ordering::SeqCst) >= results.len());

        pool.scale_to(1, &guard);
        assert_eq!(pool.active(), 1);

        pool.stop_all();
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn scale_to_zero_without_ever_spawning() {
        let shutdown = Shutdown::new(std::future::pending::<()>());
        let guard = shutdown.guard();

        let (result_tx, _result_rx) = mpsc::channel(1);
        let mut pool = VuPool::new(CountingService::default().boxed(), target(), result_tx);

        pool.scale_to(0, &guard);
        assert_eq!(pool.active(), 0);
    }
}
