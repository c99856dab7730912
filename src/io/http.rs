//! HTTP API for the occupancy service
//!
//! Thin routing over `OccupancyService`: parse path, query and JSON body, call
//! the service, map the result to a JSON response. Uses hyper (http1) directly.
//!
//! Error mapping:
//! - validation errors → 400 with the validation message
//! - ledger errors → 500 with a generic "Database error"

use crate::domain::types::Action;
use crate::infra::metrics::Metrics;
use crate::io::prometheus::format_prometheus_metrics;
use crate::io::sensor::{SensorBoard, SensorPayload};
use crate::services::error::OccupancyError;
use crate::services::occupancy::{ConfigPatch, OccupancyService};
use crate::services::query::{window_size, DEFAULT_DAILY_DAYS, DEFAULT_HISTORY_LIMIT};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

type HttpResponse = Response<Full<Bytes>>;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Everything a request handler can reach
pub struct AppState {
    pub service: Arc<OccupancyService>,
    pub sensor: Arc<SensorBoard>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(service: Arc<OccupancyService>, sensor: Arc<SensorBoard>, metrics: Arc<Metrics>) -> Self {
        Self { service, sensor, metrics }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UpdateRequest {
    action: Option<String>,
    count: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SetRequest {
    count: Option<i64>,
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => response(status, "application/json", bytes),
        Err(e) => {
            error!(error = %e, "response_serialize_failed");
            response(StatusCode::INTERNAL_SERVER_ERROR, "application/json", r#"{"success":false}"#)
        }
    }
}

fn error_json(status: StatusCode, message: &str) -> HttpResponse {
    json_response(status, &json!({ "success": false, "error": message }))
}

fn error_response(err: &OccupancyError) -> HttpResponse {
    match err {
        OccupancyError::Validation(msg) => error_json(StatusCode::BAD_REQUEST, msg),
        OccupancyError::Store(_) => error_json(StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
    }
}

fn ok_json<T: Serialize>(result: Result<T, OccupancyError>) -> HttpResponse {
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => error_response(&e),
    }
}

fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then_some(v)
    })
}

/// Collect and parse a JSON body of at most `MAX_BODY_BYTES`.
/// An empty body parses as `T::default()`.
async fn read_json<T, B>(body: B) -> Result<T, HttpResponse>
where
    T: DeserializeOwned + Default,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(error_json(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"))
        }
        Err(e) => return Err(error_json(StatusCode::BAD_REQUEST, &format!("unreadable body: {e}"))),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| error_json(StatusCode::BAD_REQUEST, &format!("invalid JSON body: {e}")))
}

async fn handle_update(req: Request<Incoming>, service: &OccupancyService) -> HttpResponse {
    let body: UpdateRequest = match read_json(req.into_body()).await {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let action = match body.action.as_deref().map(str::parse::<Action>) {
        Some(Ok(action @ (Action::Enter | Action::Exit))) => action,
        _ => return error_json(StatusCode::BAD_REQUEST, "Invalid action"),
    };

    match service.update_visitors(action, body.count) {
        Ok(event) => json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "currentVisitors": event.current_visitors,
                "timestamp": event.timestamp,
            }),
        ),
        Err(e) => error_response(&e),
    }
}

async fn handle_set(req: Request<Incoming>, service: &OccupancyService) -> HttpResponse {
    let body: SetRequest = match read_json(req.into_body()).await {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    match service.set_visitors(body.count) {
        Ok(event) => json_response(
            StatusCode::OK,
            &json!({ "success": true, "currentVisitors": event.current_visitors }),
        ),
        Err(e) => error_response(&e),
    }
}

async fn handle_config(req: Request<Incoming>, service: &OccupancyService) -> HttpResponse {
    let patch: ConfigPatch = match read_json(req.into_body()).await {
        Ok(patch) => patch,
        Err(resp) => return resp,
    };
    match service.update_config(patch) {
        Ok(config) => json_response(StatusCode::OK, &json!({ "success": true, "config": config })),
        Err(e) => error_response(&e),
    }
}

async fn handle_sensor_data(req: Request<Incoming>, sensor: &SensorBoard) -> HttpResponse {
    let payload: SensorPayload = match read_json(req.into_body()).await {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    let reading = sensor.record(payload);
    json_response(StatusCode::OK, &json!({ "status": "success", "timestamp": reading.timestamp }))
}

fn handle_metrics(metrics: &Metrics) -> HttpResponse {
    let body = format_prometheus_metrics(metrics, &metrics.restaurant());
    response(StatusCode::OK, "text/plain; version=0.0.4; charset=utf-8", body)
}

fn preflight() -> HttpResponse {
    let mut resp = response(StatusCode::NO_CONTENT, "text/plain", Bytes::new());
    let headers = resp.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, OPTIONS"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    resp
}

async fn route(req: Request<Incoming>, state: &AppState) -> HttpResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let service = state.service.as_ref();

    match (&method, path.as_str()) {
        (&Method::GET, "/api/status") => ok_json(service.status()),
        (&Method::POST, "/api/visitors/update") => handle_update(req, service).await,
        (&Method::POST, "/api/visitors/set") => handle_set(req, service).await,
        (&Method::POST, "/api/visitors/reset") => match service.reset() {
            Ok(_) => json_response(
                StatusCode::OK,
                &json!({ "success": true, "message": "Visitor count reset" }),
            ),
            Err(e) => error_response(&e),
        },
        (&Method::GET, "/api/history") => {
            let limit = window_size(query_param(query.as_deref(), "limit"), DEFAULT_HISTORY_LIMIT);
            ok_json(service.history(limit))
        }
        (&Method::GET, "/api/stats/daily") => {
            let days = window_size(query_param(query.as_deref(), "days"), DEFAULT_DAILY_DAYS);
            ok_json(service.daily_stats(days).map(|stats| json!({ "stats": stats })))
        }
        (&Method::GET, "/api/stats/hourly") => {
            ok_json(service.hourly_stats().map(|slots| json!({ "hourlyData": slots })))
        }
        (&Method::GET, "/api/capacity/check") => ok_json(service.capacity_check()),
        (&Method::POST, "/api/config") => handle_config(req, service).await,
        (&Method::POST, "/api/test/simulate") => match service.simulate() {
            Ok(sim) => json_response(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "action": sim.action,
                    "count": sim.count,
                    "currentVisitors": sim.current_visitors,
                }),
            ),
            Err(e) => error_response(&e),
        },
        (&Method::GET, "/health") => json_response(StatusCode::OK, &service.health()),
        (&Method::GET, "/metrics") => handle_metrics(&state.metrics),
        (&Method::POST, "/api/data") => handle_sensor_data(req, &state.sensor).await,
        (&Method::GET, "/api/data") => json_response(StatusCode::OK, &state.sensor.latest()),
        (&Method::GET, "/test") => json_response(StatusCode::OK, &json!({ "message": "Hello World" })),
        (&Method::OPTIONS, _) => preflight(),
        _ => error_json(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<HttpResponse, Infallible> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = route(req, &state).await;

    let latency_us = start.elapsed().as_micros() as u64;
    state.metrics.record_request(latency_us);
    debug!(
        method = %method,
        path = %path,
        status = %resp.status().as_u16(),
        latency_us = %latency_us,
        "http_request"
    );
    Ok(resp)
}

/// Bind `addr` and serve until shutdown
pub async fn start_http_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener until the shutdown signal flips to true
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(addr = %listener.local_addr()?, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ledger_store::StoreError;

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("limit=10&days=3"), "days"), Some("3"));
        assert_eq!(query_param(Some("limit=10"), "limit"), Some("10"));
        assert_eq!(query_param(Some("flag"), "flag"), Some(""));
        assert_eq!(query_param(Some("limit=10"), "days"), None);
        assert_eq!(query_param(None, "limit"), None);
    }

    #[test]
    fn test_error_mapping() {
        let resp = error_response(&OccupancyError::validation("count must be between 0 and 10"));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = error_response(&OccupancyError::Store(StoreError::Missing));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_read_json_limits_body_size() {
        let oversized = Full::new(Bytes::from(vec![b' '; MAX_BODY_BYTES + 1]));
        let resp = read_json::<SetRequest, _>(oversized).await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = Full::new(Bytes::from_static(br#"{"count": 4}"#));
        let parsed: SetRequest = read_json(body).await.unwrap();
        assert_eq!(parsed.count, Some(4));

        let empty: SetRequest = read_json(Full::new(Bytes::new())).await.unwrap();
        assert_eq!(empty.count, None);
    }

    #[test]
    fn test_preflight_headers() {
        let resp = preflight();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
    }
}
