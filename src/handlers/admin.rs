//! Admin API: issue, inspect, renew and reset licenses.
//!
//! Every route sits behind [`require_admin`].

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::engine::{DeviceReset, Renewal};
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::handlers::run_blocking;
use crate::middleware::require_admin;
use crate::models::{IssueLicense, License, LicenseDetails, UpdateEmail};
use crate::pagination::{Paginated, PaginationQuery};
use crate::rate_limit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListLicensesQuery {
    /// Only licenses issued to this email (case-insensitive)
    pub email: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UpdateEmailResponse {
    pub ok: bool,
}

/// POST /admin/licenses
pub async fn issue_license(
    State(state): State<AppState>,
    Json(input): Json<IssueLicense>,
) -> Result<(StatusCode, Json<License>)> {
    input.validate()?;
    let license = run_blocking(&state.engine, move |engine| engine.issue(&input.email)).await?;
    Ok((StatusCode::CREATED, Json(license)))
}

/// GET /admin/licenses
pub async fn list_licenses(
    State(state): State<AppState>,
    Query(query): Query<ListLicensesQuery>,
) -> Result<Json<Paginated<LicenseDetails>>> {
    let page = PaginationQuery::new(query.limit, query.offset);
    let licenses = run_blocking(&state.engine, move |engine| {
        engine.list_licenses(query.email.as_deref(), &page)
    })
    .await?;
    Ok(Json(licenses))
}

/// GET /admin/licenses/{code}
pub async fn get_license(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LicenseDetails>> {
    let details = run_blocking(&state.engine, move |engine| engine.get_license(&code)).await?;
    Ok(Json(details))
}

/// POST /admin/licenses/{code}/renew
pub async fn renew_license(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Renewal>> {
    let renewal = run_blocking(&state.engine, move |engine| engine.renew(&code)).await?;
    Ok(Json(renewal))
}

/// POST /admin/licenses/{code}/reset-devices
pub async fn reset_devices(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<DeviceReset>> {
    let reset = run_blocking(&state.engine, move |engine| engine.reset_devices(&code)).await?;
    Ok(Json(reset))
}

/// PUT /admin/licenses/{code}/email
pub async fn update_email(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(input): Json<UpdateEmail>,
) -> Result<Json<UpdateEmailResponse>> {
    input.validate()?;
    run_blocking(&state.engine, move |engine| engine.update_email(&code, &input.email)).await?;
    Ok(Json(UpdateEmailResponse { ok: true }))
}

pub fn router(state: AppState, rate_limit: RateLimitConfig) -> Router<AppState> {
    let router = Router::new()
        .route("/admin/licenses", post(issue_license).get(list_licenses))
        .route("/admin/licenses/{code}", get(get_license))
        .route("/admin/licenses/{code}/renew", post(renew_license))
        .route("/admin/licenses/{code}/reset-devices", post(reset_devices))
        .route("/admin/licenses/{code}/email", put(update_email))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    rate_limit::limit_per_minute(router, rate_limit.admin_rpm, rate_limit.trust_proxy_headers)
}
