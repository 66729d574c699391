use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppState;
use super::schemas::HealthResponse;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HealthQuery {
    /// Include per-backend liveness. A bare `?detail` or a truthy value
    /// (`1`, `t`, `y`, `yes`, `true`) turns it on.
    pub detail: Option<String>,
}

impl HealthQuery {
    fn wants_detail(&self) -> bool {
        self.detail.as_deref().is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "" | "1" | "t" | "y" | "yes" | "true"
            )
        })
    }
}

/// `GET /health` -- aggregated backend liveness.
///
/// Responds 503 when any backend is down.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    description = "Probes the rate limiter, file repository and file storage. Per-backend results are included with `?detail`.",
    params(HealthQuery),
    responses(
        (status = 200, description = "Every backend is live", body = HealthResponse),
        (status = 503, description = "At least one backend is down", body = HealthResponse)
    )
)]
pub async fn health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    let report = state.service.health().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(HealthResponse::new(&report, query.wants_detail())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(detail: Option<&str>) -> HealthQuery {
        HealthQuery {
            detail: detail.map(str::to_owned),
        }
    }

    #[test]
    fn detail_flag_values() {
        assert!(query(Some("")).wants_detail());
        assert!(query(Some("True")).wants_detail());
        assert!(query(Some("1")).wants_detail());
        assert!(!query(Some("0")).wants_detail());
        assert!(!query(Some("no")).wants_detail());
        assert!(!query(None).wants_detail());
    }
}
