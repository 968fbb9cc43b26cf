//! Viewer-facing endpoints: share fetch and the viewer settings script.

use crate::error::{ApiError, ApiResult};
use crate::lifecycle::FetchQuery;
use crate::metrics;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use beacon_core::config::ViewerConfig;
use serde::Serialize;
use std::fmt::Write;

/// GET /api/fetch.php?id=..&since=.. - Points of a share as JSON.
pub async fn fetch_share(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    let view = lifecycle.bounded(lifecycle.fetch(query)).await?;
    metrics::record_fetch(view.kind().as_str());

    let body = serde_json::to_vec(&view)
        .map_err(|e| ApiError::Internal(format!("failed to encode share view: {e}")))?;
    Ok(([(CONTENT_TYPE, "text/json")], body).into_response())
}

#[derive(Serialize)]
struct VelocityUnitView {
    #[serde(rename = "mpsMultiplier")]
    mps_multiplier: f64,
    unit: &'static str,
}

/// Render viewer settings as `var NAME = <json>;` lines.
pub fn render_viewer_script(viewer: &ViewerConfig) -> Result<String, serde_json::Error> {
    let unit = VelocityUnitView {
        mps_multiplier: viewer.velocity_unit.mps_multiplier(),
        unit: viewer.velocity_unit.label(),
    };
    let vars: [(&str, serde_json::Value); 10] = [
        ("TILE_URI", serde_json::to_value(&viewer.tile_uri)?),
        ("ATTRIBUTION", serde_json::to_value(&viewer.attribution)?),
        ("DEFAULT_ZOOM", serde_json::to_value(viewer.default_zoom)?),
        ("MAX_ZOOM", serde_json::to_value(viewer.max_zoom)?),
        ("MAX_POINTS", serde_json::to_value(viewer.max_shown_points)?),
        (
            "VELOCITY_DELTA_TIME",
            serde_json::to_value(viewer.velocity_delta_points)?,
        ),
        ("TRAIL_COLOR", serde_json::to_value(&viewer.trail_color)?),
        ("VELOCITY_UNIT", serde_json::to_value(&unit)?),
        (
            "OFFLINE_TIMEOUT",
            serde_json::to_value(viewer.offline_timeout_secs)?,
        ),
        (
            "REQUEST_TIMEOUT",
            serde_json::to_value(viewer.request_timeout_secs)?,
        ),
    ];

    let mut script = String::new();
    for (name, value) in vars {
        // Writing to a String cannot fail.
        let _ = writeln!(script, "var {name} = {value};");
    }
    Ok(script)
}

/// GET /dynamic.js.php - Viewer settings script.
pub async fn viewer_settings(State(state): State<AppState>) -> ApiResult<Response> {
    let script = render_viewer_script(&state.config.viewer)
        .map_err(|e| ApiError::Internal(format!("failed to render viewer settings: {e}")))?;
    Ok((
        [(CONTENT_TYPE, "text/javascript; charset=utf-8")],
        script,
    )
        .into_response())
}
