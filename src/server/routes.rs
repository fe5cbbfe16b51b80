//! JSON request handlers

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use super::{websocket, AppState};
use crate::config::ModemConfig;
use crate::modem::protocol::{DataUsageRecord, SignalStatus};
use crate::store::LinkStats;

/// Response body type of every handler
pub type Body = Full<Bytes>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct CurrentView {
    status: Option<SignalStatus>,
    data_usage: Option<DataUsageRecord>,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct ConnectionStatsView {
    #[serde(flatten)]
    stats: LinkStats,
    uptime_secs: Option<u64>,
}

#[derive(Serialize)]
struct StatsView<'a> {
    connection_stats: ConnectionStatsView,
    config: &'a ModemConfig,
}

#[derive(Serialize)]
struct HealthView {
    status: &'static str,
    is_connected: bool,
    last_update: Option<DateTime<Utc>>,
    uptime_secs: u64,
}

/// Entry point for every HTTP request
pub fn handle(req: Request<Incoming>, state: AppState) -> Response<Body> {
    if req.uri().path() == "/ws" && req.method() == Method::GET {
        return websocket::upgrade(req, state);
    }
    route(req.method(), req.uri().path(), &state)
}

/// Answer a plain GET endpoint
pub fn route(method: &Method, path: &str, state: &AppState) -> Response<Body> {
    if method != Method::GET {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    match path {
        "/status" => match state.store.current_status() {
            Some(status) => json_response(StatusCode::OK, &status),
            None => error_response(StatusCode::NOT_FOUND, "No status data available"),
        },
        "/data-usage" => match state.store.current_usage() {
            Some(usage) => json_response(StatusCode::OK, &usage),
            None => error_response(StatusCode::NOT_FOUND, "No data usage data available"),
        },
        "/history" => json_response(StatusCode::OK, &state.store.status_history()),
        "/data-usage/history" => json_response(StatusCode::OK, &state.store.usage_history()),
        "/current" => {
            let (status, data_usage) = state.store.current();
            json_response(
                StatusCode::OK,
                &CurrentView {
                    status,
                    data_usage,
                    timestamp: Utc::now(),
                },
            )
        }
        "/stats" => {
            let stats = state.store.link_stats();
            let uptime_secs = stats.uptime(Utc::now()).map(|uptime| uptime.as_secs());
            json_response(
                StatusCode::OK,
                &StatsView {
                    connection_stats: ConnectionStatsView { stats, uptime_secs },
                    config: &state.modem,
                },
            )
        }
        "/health" => {
            let connected = state.store.link_stats().connected;
            let healthy = connected || !state.modem.is_enabled();
            json_response(
                StatusCode::OK,
                &HealthView {
                    status: if healthy { "healthy" } else { "disconnected" },
                    is_connected: connected,
                    last_update: state.store.last_update(),
                    uptime_secs: state.started_at.elapsed().as_secs(),
                },
            )
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// `{"error": msg}` with the given status
pub fn error_response(status: StatusCode, msg: &str) -> Response<Body> {
    json_response(status, &ErrorBody { error: msg })
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            warn!("Failed to encode response: {}", e);
            let mut response = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::modem::protocol::{RadioReading, RssiReading, Source};
    use crate::store::{StatusUpdate, TelemetryStore};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        AppState::new(
            Arc::new(TelemetryStore::new(100)),
            Broadcaster::new(Duration::from_secs(1)),
            ModemConfig::default(),
        )
    }

    async fn get(state: &AppState, path: &str) -> (StatusCode, serde_json::Value) {
        let response = route(&Method::GET, path, state);
        let status = response.status();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn usage() -> DataUsageRecord {
        DataUsageRecord {
            timestamp: Utc::now(),
            report_id: "00002CB1".to_string(),
            uplink_bytes: 340,
            downlink_bytes: 235,
            total_uplink: 307_084_139,
            total_downlink: 257_022_730,
        }
    }

    #[tokio::test]
    async fn test_empty_store_results() {
        let state = state();

        let (status, body) = get(&state, "/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No status data available");

        let (status, body) = get(&state, "/data-usage").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No data usage data available");

        let (status, body) = get(&state, "/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (_, body) = get(&state, "/data-usage/history").await;
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = get(&state, "/current").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["status"].is_null());
        assert!(body["data_usage"].is_null());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_and_usage_endpoints() {
        let state = state();
        state.store.apply_status_update(
            StatusUpdate::Radio(RadioReading::calibrate("LTE", 90, 80, 166)),
            Source::Stdin,
        );
        state
            .store
            .apply_status_update(StatusUpdate::Rssi(RssiReading::from_code(31)), Source::Stdin);
        state.store.apply_usage_update(usage());

        let (status, body) = get(&state, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["system_mode"], "LTE");
        assert_eq!(body["rssi_dbm"], -51.0);
        assert_eq!(body["source"], "stdin");

        let (_, body) = get(&state, "/data-usage").await;
        assert_eq!(body["report_id"], "00002CB1");
        assert_eq!(body["total_uplink"], 307_084_139u64);

        let (_, body) = get(&state, "/history").await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = get(&state, "/data-usage/history").await;
        assert_eq!(body[0]["downlink_bytes"], 235);

        let (_, body) = get(&state, "/current").await;
        assert_eq!(body["status"]["rsrp_dbm"], -50.0);
        assert_eq!(body["data_usage"]["report_id"], "00002CB1");
    }

    #[tokio::test]
    async fn test_stats_reports_link_and_config() {
        let state = state();
        state.store.mark_connected();
        state.store.record_frame(42);

        let (status, body) = get(&state, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection_stats"]["connected"], true);
        assert_eq!(body["connection_stats"]["bytes_received"], 42);
        assert_eq!(body["connection_stats"]["messages_received"], 1);
        assert!(body["connection_stats"]["uptime_secs"].is_u64());
        assert_eq!(body["config"]["ws_url"], "ws://localhost:7681/ws");
        assert_eq!(body["config"]["max_reconnect"], 10);
    }

    #[tokio::test]
    async fn test_health_follows_link_state() {
        let state = state();
        let (_, body) = get(&state, "/health").await;
        assert_eq!(body["status"], "disconnected");
        assert_eq!(body["is_connected"], false);
        assert!(body["last_update"].is_null());

        state.store.mark_connected();
        let (_, body) = get(&state, "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["is_connected"], true);
    }

    #[tokio::test]
    async fn test_health_without_remote_source() {
        let modem = ModemConfig {
            ws_url: String::new(),
            ..ModemConfig::default()
        };
        let state = AppState::new(
            Arc::new(TelemetryStore::new(100)),
            Broadcaster::new(Duration::from_secs(1)),
            modem,
        );

        let (_, body) = get(&state, "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["is_connected"], false);
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let state = state();

        let (status, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");

        let response = route(&Method::POST, "/status", &state);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
