use rama::{
    Service,
    error::OpaqueError,
    http::{Body, Request, Response, Uri},
};

/// The per-iteration workload: issue exactly one unauthenticated GET
/// against `uri` and hand the response back untouched.
///
/// Deliberately free of branching: no headers, no body, no retry, no
/// status inspection. Failure accounting belongs to the caller.
pub async fn run_iteration<S>(client: &S, uri: &Uri) -> Result<Response, OpaqueError>
where
    S: Service<Request, Output = Response, Error = OpaqueError>,
{
    let mut req = Request::new(Body::empty());
    *req.uri_mut() = uri.clone();
    client.serve(req).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rama::http::{Method, StatusCode, service::web::response::IntoResponse};

    use super::*;

    #[derive(Debug)]
    struct SeenRequest {
        method: Method,
        uri: Uri,
        header_count: usize,
    }

    /// In-process stand-in for the HTTP client: records every request
    /// and answers 200 without any network involved.
    #[derive(Debug, Default, Clone)]
    struct RecordingClient {
        seen: Arc<Mutex<Vec<SeenRequest>>>,
    }

    impl Service<Request> for RecordingClient {
        type Output = Response;
        type Error = OpaqueError;

        async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
            self.seen
                .lock()
                .expect("recording client mutex")
                .push(SeenRequest {
                    method: req.method().clone(),
                    uri: req.uri().clone(),
                    header_count: req.headers().len(),
                });
            Ok(StatusCode::OK.into_response())
        }
    }

    /// Always fails at the transport level, like a refused connection.
    #[derive(Debug)]
    struct RefusingClient;

    impl Service<Request> for RefusingClient {
        type Output = Response;
        type Error = OpaqueError;

        async fn serve(&self, _req: Request) -> Result<Self::Output, Self::Error> {
            Err(OpaqueError::from_display("connection refused"))
        }
    }

    fn target() -> Uri {
        Uri::from_static("http://127.0.0.1:8000/")
    }

    #[tokio::test]
    async fn issues_a_single_bare_get() {
        let client = RecordingClient::default();

        run_iteration(&client, &target())
            .await
            .expect("workload iteration");

        let seen = client.seen.lock().expect("recording client mutex");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].uri, target());
        assert_eq!(seen[0].header_count, 0);
    }

    #[tokio::test]
    async fn n_invocations_issue_n_independent_requests() {
        let client = RecordingClient::default();

        for _ in 0..5 {
            run_iteration(&client, &target())
                .await
                .expect("workload iteration");
        }

        let seen = client.seen.lock().expect("recording client mutex");
        assert_eq!(seen.len(), 5);
        assert!(
            seen.iter()
                .all(|req| req.method == Method::GET && req.header_count == 0)
        );
    }

    #[tokio::test]
    async fn transport_errors_propagate_untouched() {
        let err = run_iteration(&RefusingClient, &target())
            .await
            .expect_err("refused connection surfaces as error");
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn failure_leaves_no_state_behind() {
        // A failed iteration must not change how the next one behaves:
        // the workload carries no state between invocations.
        let _ = run_iteration(&RefusingClient, &target()).await;

        let client = RecordingClient::default();
        run_iteration(&client, &target())
            .await
            .expect("workload iteration");
        assert_eq!(client.seen.lock().expect("recording client mutex").len(), 1);
    }
}
