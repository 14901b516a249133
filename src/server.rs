use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::geo::validate_coordinates;
use crate::report::ReportSubmission;
use crate::store::{MemoryReportStore, ReportFilter};

/// Build the `/traffic-reports` router over a shared store.
///
/// The CORS layer answers the OPTIONS preflight: any origin, `Content-Type`
/// allowed, methods GET/POST/OPTIONS/DELETE.
pub fn router(store: Arc<MemoryReportStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE]);

    Router::new()
        .route(
            "/traffic-reports",
            post(create_report)
                .get(list_reports)
                .delete(cleanup_reports)
                .fallback(method_not_allowed),
        )
        .layer(cors)
        .with_state(store)
}

/// Bind and serve until the process is stopped. The store dies with the
/// process; that's the accepted limitation of the ephemeral variant.
pub async fn serve(addr: SocketAddr, store: Arc<MemoryReportStore>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "traffic-reports server listening");
    axum::serve(listener, router(store)).await?;
    Ok(())
}

/// Query parameters of the GET endpoint. `since` wins over `start`/`end`.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    start: Option<String>,
    end: Option<String>,
    /// Epoch milliseconds.
    since: Option<i64>,
}

async fn create_report(State(store): State<Arc<MemoryReportStore>>, body: String) -> Response {
    // Parsed by hand so a malformed body maps to the wire-compatible 500,
    // not the extractor's 4xx.
    match serde_json::from_str::<ReportSubmission>(&body) {
        Ok(submission) => {
            let stored = store.create(submission);
            info!(id = %stored.id, kind = ?stored.kind, "stored traffic report");
            (StatusCode::OK, Json(stored)).into_response()
        }
        Err(error) => {
            warn!(%error, "rejecting malformed report submission");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
        }
    }
}

async fn list_reports(
    State(store): State<Arc<MemoryReportStore>>,
    Query(params): Query<ListParams>,
) -> Response {
    let filter = match params {
        ListParams {
            since: Some(millis),
            ..
        } => {
            let Some(since) = DateTime::from_timestamp_millis(millis) else {
                return error_response(StatusCode::BAD_REQUEST, "since is out of range");
            };
            ReportFilter::Since(since)
        }
        ListParams {
            start: Some(start),
            end: Some(end),
            ..
        } => {
            if !validate_coordinates(&start) || !validate_coordinates(&end) {
                return error_response(StatusCode::BAD_REQUEST, "malformed route coordinates");
            }
            ReportFilter::Route { start, end }
        }
        ListParams {
            start: Some(_), ..
        }
        | ListParams { end: Some(_), .. } => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "start and end must be provided together",
            );
        }
        ListParams { .. } => ReportFilter::All,
    };

    (StatusCode::OK, Json(store.query(&filter))).into_response()
}

async fn cleanup_reports(State(store): State<Arc<MemoryReportStore>>) -> Response {
    let removed = store.purge_expired();
    info!(removed, "purged expired traffic reports");
    (StatusCode::OK, Json(json!({ "cleaned": true }))).into_response()
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::report::TrafficReport;

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn store() -> Arc<MemoryReportStore> {
        Arc::new(MemoryReportStore::new())
    }

    fn accident_body() -> String {
        json!({
            "location": { "lat": 40.0, "lon": -74.0 },
            "type": "accident",
            "deviceId": "device-1",
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_post_then_get_round_trip() {
        let store = store();

        let response = create_report(State(store.clone()), accident_body()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stored: TrafficReport = json_body(response).await;
        assert_eq!(stored.location, Some(GeoPoint::new(40.0, -74.0)));
        assert!(stored.expires_at.is_some());

        let inside = Query(ListParams {
            start: Some("40.0,-74.0".to_string()),
            end: Some("41.0,-74.0".to_string()),
            since: None,
        });
        let response = list_reports(State(store.clone()), inside).await;
        let reports: Vec<TrafficReport> = json_body(response).await;
        assert_eq!(reports, vec![stored]);

        let far_away = Query(ListParams {
            start: Some("10,10".to_string()),
            end: Some("11,11".to_string()),
            since: None,
        });
        let response = list_reports(State(store), far_away).await;
        let reports: Vec<TrafficReport> = json_body(response).await;
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_since_mode_wins_over_route_mode() {
        let store = store();
        let response = create_report(State(store.clone()), accident_body()).await;
        let stored: TrafficReport = json_body(response).await;

        let params = Query(ListParams {
            // A route that would not match...
            start: Some("10,10".to_string()),
            end: Some("11,11".to_string()),
            // ...but `since` takes priority and ignores it.
            since: Some(stored.timestamp.timestamp_millis() - 1),
        });
        let response = list_reports(State(store), params).await;
        let reports: Vec<TrafficReport> = json_body(response).await;
        assert_eq!(reports, vec![stored]);
    }

    #[tokio::test]
    async fn test_get_without_parameters_returns_everything() {
        let store = store();
        create_report(State(store.clone()), accident_body()).await;

        let response = list_reports(State(store), Query(ListParams::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let reports: Vec<TrafficReport> = json_body(response).await;
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_500() {
        let response = create_report(State(store()), "{not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = json_body(response).await;
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn test_malformed_route_coordinates_are_rejected() {
        let params = Query(ListParams {
            start: Some("garbage".to_string()),
            end: Some("11,11".to_string()),
            since: None,
        });
        let response = list_reports(State(store()), params).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_half_a_route_is_rejected() {
        let params = Query(ListParams {
            start: Some("10,10".to_string()),
            end: None,
            since: None,
        });
        let response = list_reports(State(store()), params).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cleanup_reports_cleaned_flag() {
        let response = cleanup_reports(State(store())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body, json!({ "cleaned": true }));
    }
}
