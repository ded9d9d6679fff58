use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::{
        Body, Request, Response, StatusCode,
        headers::ContentType,
        layer::trace::TraceLayer,
        server::HttpServer,
        service::web::response::{Headers, IntoResponse},
    },
    net::socket::Interface,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use clap::Args;

/// Body served for every request, mirroring the tiny upstream servers
/// this tool exists to pound.
const BODY: &str = "Have a nice day!\n";

#[derive(Debug, Clone, Args)]
/// serve a constant-response target for local load runs
pub struct MockCommand {
    /// network interface to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:8000"
    )]
    pub bind: Interface,

    /// fixed artificial delay before every response
    #[arg(long, value_name = "SECONDS", default_value_t = 0.)]
    pub base_latency: f64,

    /// extra uniform random delay in [0, jitter] added per response
    #[arg(long, value_name = "SECONDS", default_value_t = 0.)]
    pub jitter: f64,
}

pub async fn exec(guard: ShutdownGuard, args: MockCommand) -> Result<(), OpaqueError> {
    let exec = Executor::graceful(guard);
    let tcp_listener = TcpListener::bind(args.bind.clone(), exec.clone())
        .await
        .map_err(OpaqueError::from_boxed)
        .context("bind mock target server")?;

    let http_svc = TraceLayer::new_for_http().into_layer(MockTargetServer::new(
        args.base_latency,
        args.jitter,
    ));

    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for mock target server")?;
    tracing::info!(%server_addr, "mock target server listening");

    tcp_listener.serve(http_server).await;

    Ok(())
}

#[derive(Debug)]
struct MockTargetServer {
    base_latency: f64,
    jitter: f64,
}

impl MockTargetServer {
    fn new(base_latency: f64, jitter: f64) -> Self {
        Self {
            base_latency: base_latency.max(0.),
            jitter: jitter.max(0.),
        }
    }

    fn compute_delay(&self) -> Duration {
        if self.jitter == 0.0 {
            return Duration::from_secs_f64(self.base_latency);
        }

        let u: f64 = rand::random();
        Duration::from_secs_f64(self.base_latency + u * self.jitter)
    }
}

impl Service<Request> for MockTargetServer {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, _req: Request) -> Result<Self::Output, Self::Error> {
        let delay = self.compute_delay();
        if delay.as_nanos() > 0 {
            tokio::time::sleep(delay).await;
        }

        Ok((
            StatusCode::OK,
            Headers::single(ContentType::text_utf8()),
            Body::from(BODY),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_zero_without_latency_flags() {
        let server = MockTargetServer::new(0., 0.);
        assert!(server.compute_delay().is_zero());
    }

    #[test]
    fn delay_stays_within_configured_bounds() {
        let server = MockTargetServer::new(0.01, 0.05);
        for _ in 0..100 {
            let delay = server.compute_delay().as_secs_f64();
            assert!(delay >= 0.01);
            assert!(delay <= 0.06);
        }
    }

    #[test]
    fn negative_flags_are_clamped() {
        let server = MockTargetServer::new(-1., -1.);
        assert!(server.compute_delay().is_zero());
    }

    #[tokio::test]
    async fn serves_the_constant_body() {
        let server = MockTargetServer::new(0., 0.);
        let resp = server
            .serve(Request::new(Body::empty()))
            .await
            .expect("mock response");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
