use rama::{
    Layer as _, Service as _,
    error::OpaqueError,
    http::{
        Body, Request, Response,
        client::EasyHttpWebClient,
        layer::{map_request_body::MapRequestBodyLayer, map_response_body::MapResponseBodyLayer},
    },
    layer::MapErrLayer,
    rt::Executor,
    service::BoxService,
};

/// Plain HTTP client shared by every virtual user.
///
/// Connection reuse stays an internal concern of the client stack; the
/// workload never observes it. No retry and no timeout layers: failed
/// requests surface directly in the run's failure accounting.
pub(super) fn http_client(exec: Executor) -> BoxService<Request, Response, OpaqueError> {
    (
        MapResponseBodyLayer::new(Body::new),
        MapErrLayer::new(OpaqueError::from_std),
        MapRequestBodyLayer::new(Body::new),
    )
        .into_layer(EasyHttpWebClient::default_with_executor(exec))
        .boxed()
}
