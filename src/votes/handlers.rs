use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use super::{
    dto::{VoteRequest, VoteResponse},
    services,
};
use crate::{auth::extractors::CurrentUser, error::AppResult, state::AppState};

pub fn vote_routes() -> Router<AppState> {
    Router::new().route("/votes", post(vote))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = payload.post_id))]
pub async fn vote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<VoteRequest>,
) -> AppResult<(StatusCode, Json<VoteResponse>)> {
    let outcome =
        services::cast_or_retract(state.store.as_ref(), user.id, payload.post_id, payload.dir)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(VoteResponse {
            message: outcome.message().to_string(),
        }),
    ))
}
