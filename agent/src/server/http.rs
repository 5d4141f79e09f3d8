//! Admin HTTP server for health checks and metrics

use crate::audit;
use crate::metrics;
use crate::profiler::LocalProfiler;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;

/// Start the admin HTTP server serving /healthz, /readyz, and /metrics.
pub async fn serve_admin(
    addr: SocketAddr,
    profiler: Arc<dyn LocalProfiler>,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let profiler = profiler.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let profiler = profiler.clone();
                async move { Ok::<_, hyper::Error>(handle(&req, profiler.as_ref())) }
            }))
        }
    });

    tracing::info!("Admin HTTP server listening on {}", addr);
    Server::bind(&addr).serve(make_svc).await
}

fn text(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

fn handle(req: &Request<Body>, profiler: &dyn LocalProfiler) -> Response<Body> {
    let path = req.uri().path();
    let response = match path {
        "/healthz" => text(StatusCode::OK, "ok\n"),

        "/readyz" => match profiler.state() {
            Ok(_) => text(StatusCode::OK, "ready\n"),
            Err(_) => text(StatusCode::SERVICE_UNAVAILABLE, "not ready\n"),
        },

        "/metrics" => {
            let mut response = text(StatusCode::OK, metrics::encode_metrics());
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }

        _ => return text(StatusCode::NOT_FOUND, "not found\n"),
    };

    audit::admin_http_request(path, response.status().as_u16());
    response
}
