//! HTTP API for starting scans and managing discovered hosts.
//!
//! `POST /api/network-scan` validates synchronously and answers `202` before
//! any host is probed; progress is then polled through
//! `GET /api/network-scan/:id`. Error bodies are `{success: false, message}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use assetscan_core::{
    DiscoveredHost, HostId, HostPatch, HostStatus, MonitoringIntegration, ScanId, ScanOptions,
    ScanRequest,
};
use assetscan_store::{HostQuery, StoreError};

use crate::error::INVALID_RANGE_MESSAGE;
use crate::jobs::{ScanJobs, ScanStatus};
use crate::range::validate_range;

pub const IP_RANGE_REQUIRED_MESSAGE: &str = "IP range is required";

/// Build the API router over a job registry.
pub fn router(jobs: ScanJobs) -> Router {
    Router::new()
        .route("/api/network-scan", post(start_scan).get(list_scans))
        .route(
            "/api/network-scan/:id",
            get(scan_status).delete(cancel_scan),
        )
        .route("/api/discovered-hosts", get(list_hosts))
        .route(
            "/api/discovered-hosts/:id",
            get(get_host).patch(update_host).delete(delete_host),
        )
        .with_state(jobs)
}

// ── Errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::not_found("Discovered host not found"),
            other => {
                tracing::error!(error = %other, "Host store failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: other.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Rejected request body");
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    success: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = MessageBody {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ── Scan initiation ───────────────────────────────────────────────

/// Request body for `POST /api/network-scan`. Every field is optional on the
/// wire so missing values can be reported with a precise message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkScanBody {
    pub ip_range: Option<String>,
    #[serde(rename = "primaryDNS")]
    pub primary_dns: Option<String>,
    #[serde(rename = "secondaryDNS")]
    pub secondary_dns: Option<String>,
    #[serde(flatten)]
    pub options: ScanOptions,
    pub zabbix_url: Option<String>,
    pub zabbix_api_key: Option<String>,
    pub use_zabbix: Option<bool>,
}

/// Normalise and validate a scan body into a request.
pub fn scan_request_from_body(body: NetworkScanBody) -> ApiResult<ScanRequest> {
    let ip_range = body.ip_range.as_deref().map(str::trim).unwrap_or_default();
    if ip_range.is_empty() {
        return Err(ApiError::bad_request(IP_RANGE_REQUIRED_MESSAGE));
    }
    if validate_range(ip_range).is_err() {
        return Err(ApiError::bad_request(INVALID_RANGE_MESSAGE));
    }

    let dns: Vec<&str> = [body.primary_dns.as_deref(), body.secondary_dns.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let mut request = ScanRequest::new(ip_range, body.options)
        .with_dns_servers(&dns)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let zabbix_url = body
        .zabbix_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let zabbix_api_key = body.zabbix_api_key.filter(|k| !k.trim().is_empty());
    if body.use_zabbix.is_some() || zabbix_url.is_some() || zabbix_api_key.is_some() {
        request = request.with_monitoring(MonitoringIntegration {
            enabled: body.use_zabbix.unwrap_or(false),
            url: zabbix_url,
            api_key: zabbix_api_key,
        });
    }

    Ok(request)
}

/// Normalised options echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetails {
    pub ip_range: String,
    pub dns_servers: Vec<String>,
    #[serde(flatten)]
    pub options: ScanOptions,
    pub use_zabbix: bool,
    pub zabbix_url: Option<String>,
    pub zabbix_api_key_provided: bool,
}

impl From<&ScanRequest> for ScanDetails {
    fn from(request: &ScanRequest) -> Self {
        let monitoring = request.monitoring.clone().unwrap_or_default();
        Self {
            ip_range: request.ip_range.clone(),
            dns_servers: request.dns_servers.iter().map(|ip| ip.to_string()).collect(),
            options: request.options.clone(),
            use_zabbix: monitoring.enabled,
            zabbix_url: monitoring.url,
            zabbix_api_key_provided: monitoring.api_key.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScanResponse {
    pub success: bool,
    pub message: String,
    pub scan_id: ScanId,
    pub scan_details: ScanDetails,
}

async fn start_scan(
    State(jobs): State<ScanJobs>,
    body: Result<Json<NetworkScanBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartScanResponse>)> {
    let Json(body) = body?;
    let request = match scan_request_from_body(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e.message, "Rejected network scan request");
            return Err(e);
        }
    };

    let scan_details = ScanDetails::from(&request);
    let scan_id = jobs.spawn(request);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartScanResponse {
            success: true,
            message: "Network scan started".to_string(),
            scan_id,
            scan_details,
        }),
    ))
}

async fn list_scans(State(jobs): State<ScanJobs>) -> Json<Vec<ScanStatus>> {
    Json(jobs.list())
}

async fn scan_status(
    State(jobs): State<ScanJobs>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScanStatus>> {
    jobs.status(ScanId(id))
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Scan not found"))
}

async fn cancel_scan(
    State(jobs): State<ScanJobs>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ScanStatus>)> {
    jobs.cancel(ScanId(id))
        .map(|status| (StatusCode::ACCEPTED, Json(status)))
        .ok_or_else(|| ApiError::not_found("Scan not found"))
}

// ── Discovered hosts ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostListParams {
    pub status: Option<HostStatus>,
    pub scan_id: Option<Uuid>,
}

async fn list_hosts(
    State(jobs): State<ScanJobs>,
    Query(params): Query<HostListParams>,
) -> ApiResult<Json<Vec<DiscoveredHost>>> {
    let query = HostQuery {
        status: params.status,
        scan_id: params.scan_id.map(ScanId),
    };
    Ok(Json(jobs.store().list(&query)?))
}

async fn get_host(
    State(jobs): State<ScanJobs>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DiscoveredHost>> {
    Ok(Json(jobs.store().get(HostId(id))?))
}

async fn update_host(
    State(jobs): State<ScanJobs>,
    Path(id): Path<Uuid>,
    patch: Result<Json<HostPatch>, JsonRejection>,
) -> ApiResult<Json<DiscoveredHost>> {
    let Json(patch) = patch?;
    Ok(Json(jobs.store().update(HostId(id), patch)?))
}

async fn delete_host(
    State(jobs): State<ScanJobs>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    jobs.store().delete(HostId(id))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Discovered host deleted",
    })))
}
