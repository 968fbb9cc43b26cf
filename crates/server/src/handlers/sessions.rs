//! Device-facing endpoints: create, post, stop, new-link, adopt.

use super::common::ok_lines;
use crate::error::ApiResult;
use crate::lifecycle::{AdoptRequest, CreateRequest, NewLinkRequest, PostRequest, StopRequest};
use crate::metrics;
use crate::state::AppState;
use axum::Form;
use axum::extract::State;
use axum::response::Response;

/// POST /api/create.php - Start a session and attach it to a share.
pub async fn create_session(
    State(state): State<AppState>,
    Form(req): Form<CreateRequest>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    let created = lifecycle.bounded(lifecycle.create(req)).await?;
    metrics::record_session_created(created.mode.as_str());
    Ok(ok_lines(created.lines()))
}

/// POST /api/post.php - Report a location point.
pub async fn post_location(
    State(state): State<AppState>,
    Form(req): Form<PostRequest>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    let posted = lifecycle.bounded(lifecycle.post(req)).await?;
    metrics::POINTS_POSTED.inc();
    Ok(ok_lines(posted.lines()))
}

/// POST /api/stop.php - Stop one share or the whole session.
pub async fn stop_session(
    State(state): State<AppState>,
    Form(req): Form<StopRequest>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    lifecycle.bounded(lifecycle.stop(req)).await?;
    metrics::STOPS.inc();
    Ok(ok_lines(Vec::<String>::new()))
}

/// POST /api/new-link.php - Add another solo link to a session.
pub async fn new_link(
    State(state): State<AppState>,
    Form(req): Form<NewLinkRequest>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    let link = lifecycle.bounded(lifecycle.new_link(req)).await?;
    Ok(ok_lines([link.view_link, link.share_id]))
}

/// POST /api/adopt.php - Move a solo share's host into a group.
pub async fn adopt_share(
    State(state): State<AppState>,
    Form(req): Form<AdoptRequest>,
) -> ApiResult<Response> {
    let lifecycle = &state.lifecycle;
    lifecycle.bounded(lifecycle.adopt(req)).await?;
    metrics::ADOPTIONS.inc();
    Ok(ok_lines(Vec::<String>::new()))
}
