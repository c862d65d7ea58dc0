//! Per-IP rate limiting.
//!
//! The launcher check and the admin API get separate budgets, configured via
//! `RATE_LIMIT_CHECK_RPM` and `RATE_LIMIT_ADMIN_RPM`. A budget of 0 disables
//! the layer.
//!
//! By default limits key on the peer address, so the server must be started
//! with `into_make_service_with_connect_info::<SocketAddr>()`. Behind a
//! reverse proxy every request has the proxy's address and all clients share
//! one bucket; set `TRUST_PROXY_HEADERS=1` there to key on `X-Forwarded-For`
//! / `X-Real-IP` / `Forwarded` instead. Only do that when the proxy
//! overwrites those headers, since clients can otherwise pick their own key.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor};

type Middleware = governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>;

/// Rate limiter keyed on the TCP peer address.
pub type RateLimitLayer = GovernorLayer<PeerIpKeyExtractor, Middleware, axum::body::Body>;

/// Rate limiter keyed on the client address reported by a reverse proxy.
pub type ProxiedRateLimitLayer = GovernorLayer<SmartIpKeyExtractor, Middleware, axum::body::Body>;

fn period(requests_per_minute: u32) -> Duration {
    Duration::from_secs((60 / requests_per_minute as u64).max(1))
}

/// Layer allowing `requests_per_minute` per peer IP, or None when disabled.
pub fn per_minute_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    let config = GovernorConfigBuilder::default()
        .period(period(requests_per_minute))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Like [`per_minute_layer`], keyed on proxy headers.
pub fn proxied_per_minute_layer(requests_per_minute: u32) -> Option<ProxiedRateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .period(period(requests_per_minute))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Apply the limiter matching `trust_proxy_headers` to `router`.
pub fn limit_per_minute<S>(
    router: Router<S>,
    requests_per_minute: u32,
    trust_proxy_headers: bool,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if trust_proxy_headers {
        match proxied_per_minute_layer(requests_per_minute) {
            Some(layer) => router.layer(layer),
            None => router,
        }
    } else {
        match per_minute_layer(requests_per_minute) {
            Some(layer) => router.layer(layer),
            None => router,
        }
    }
}
