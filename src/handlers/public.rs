//! Launcher-facing endpoints. No authentication: the license code is the
//! credential.

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::code::normalize_code;
use crate::config::{CheckPolicy, RateLimitConfig};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::handlers::run_blocking;
use crate::models::normalize_device_id;
use crate::rate_limit;
use crate::state::AppState;
use crate::util::extract_client_ip;

/// Cache hint for denied checks, so a fixed license is picked up quickly.
pub const DENY_TTL_SECONDS: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(alias = "token")]
    pub code: String,
    #[serde(alias = "device_id")]
    pub machine_id: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Why a check was allowed or denied. The launcher shows denials as
/// "No permission: <REASON>".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckReason {
    Ok,
    LicenseExpiresSoon,
    InvalidCode,
    LicenseExpired,
    DeviceLimitReached,
    MachineBlocked,
    VersionNotAllowed,
    ServiceDisabled,
    InvalidRequest,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allow: bool,
    pub reason: CheckReason,
    /// How long the launcher may cache this decision.
    pub ttl_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl CheckResponse {
    fn deny(reason: CheckReason) -> Self {
        Self {
            allow: false,
            reason,
            ttl_seconds: DENY_TTL_SECONDS,
            remaining_days: None,
            device_count: None,
            expires_at: None,
        }
    }
}

/// Deployment-wide gates, evaluated before the license is looked up.
pub fn policy_denial(
    policy: &CheckPolicy,
    machine_id: &str,
    version: Option<&str>,
) -> Option<CheckReason> {
    if policy.kill_switch {
        return Some(CheckReason::ServiceDisabled);
    }
    if policy.blocked_machines.contains(machine_id) {
        return Some(CheckReason::MachineBlocked);
    }
    if let Some(required) = policy.required_version.as_deref()
        && version.map(str::trim) != Some(required)
    {
        return Some(CheckReason::VersionNotAllowed);
    }
    None
}

/// Domain errors become a denial; anything else (storage, internal) is a
/// real error response so the launcher reports a server problem.
fn denial_reason(error: &AppError) -> Option<CheckReason> {
    match error {
        AppError::NotFound(_) => Some(CheckReason::InvalidCode),
        AppError::Expired { .. } => Some(CheckReason::LicenseExpired),
        AppError::DeviceLimit { .. } => Some(CheckReason::DeviceLimitReached),
        AppError::Validation(_) => Some(CheckReason::InvalidRequest),
        _ => None,
    }
}

/// POST /check - verify a license code on a machine, binding the machine if
/// the license has a free slot.
pub async fn check_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>> {
    let ip = extract_client_ip(&headers);
    let ip = ip.as_deref().unwrap_or("-");

    // The kill switch answers before anything in the request is looked at.
    if state.check_policy.kill_switch {
        tracing::warn!(ip, "Check denied: service disabled");
        return Ok(Json(CheckResponse::deny(CheckReason::ServiceDisabled)));
    }

    let Ok(code) = normalize_code(&req.code) else {
        tracing::warn!(ip, "Check denied: malformed code");
        return Ok(Json(CheckResponse::deny(CheckReason::InvalidCode)));
    };
    let Ok(machine_id) = normalize_device_id(&req.machine_id) else {
        tracing::warn!(code = %code, ip, "Check denied: bad machine id");
        return Ok(Json(CheckResponse::deny(CheckReason::InvalidRequest)));
    };

    if let Some(reason) = policy_denial(&state.check_policy, &machine_id, req.version.as_deref()) {
        tracing::warn!(code = %code, ip, reason = reason.as_ref(), "Check denied by policy");
        return Ok(Json(CheckResponse::deny(reason)));
    }

    let result = {
        let (code, machine_id) = (code.clone(), machine_id);
        run_blocking(&state.engine, move |engine| engine.check(&code, &machine_id)).await
    };

    match result {
        Ok(outcome) => {
            let reason = if outcome.expires_soon {
                CheckReason::LicenseExpiresSoon
            } else {
                CheckReason::Ok
            };
            tracing::debug!(
                code = %code,
                device_count = outcome.device_count,
                remaining_days = outcome.remaining_days,
                "Check allowed"
            );
            Ok(Json(CheckResponse {
                allow: true,
                reason,
                ttl_seconds: state.check_policy.ttl_seconds,
                remaining_days: Some(outcome.remaining_days),
                device_count: Some(outcome.device_count),
                expires_at: Some(outcome.expires_at),
            }))
        }
        Err(e) => match denial_reason(&e) {
            Some(reason) => {
                tracing::warn!(code = %code, ip, reason = reason.as_ref(), "Check denied");
                Ok(Json(CheckResponse::deny(reason)))
            }
            None => Err(e),
        },
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ts: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ts: state.engine.now(),
    })
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    let check = Router::new().route("/check", post(check_license));
    let check = rate_limit::limit_per_minute(check, rate_limit.check_rpm, rate_limit.trust_proxy_headers);

    Router::new().route("/health", get(health)).merge(check)
}
