use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    repo_types::{PostInput, PostQuery, PostView, PostWithVotes},
    services,
};
use crate::{auth::extractors::CurrentUser, error::AppResult, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PostQuery>,
) -> AppResult<Json<Vec<PostWithVotes>>> {
    let posts = services::list(state.store.as_ref(), &query).await?;
    Ok(Json(posts))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = id))]
pub async fn get_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<PostWithVotes>> {
    let post = services::get(state.store.as_ref(), id).await?;
    Ok(Json(post))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<PostInput>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let post = services::create(state.store.as_ref(), user.id, &input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = id))]
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(input): Json<PostInput>,
) -> AppResult<Json<PostView>> {
    let post = services::update(state.store.as_ref(), id, user.id, &input).await?;
    Ok(Json(post))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = id))]
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    services::delete(state.store.as_ref(), id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
