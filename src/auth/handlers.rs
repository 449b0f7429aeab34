use axum::{extract::State, routing::post, Form, Json, Router};
use tracing::instrument;

use super::{
    dto::{LoginForm, TokenResponse},
    services,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, form), fields(email = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let token = services::login(state.store.as_ref(), &state.jwt, &form.username, &form.password)
        .await
        .map_err(|e| match e {
            AppError::InvalidCredential => AppError::Forbidden("Invalid credentials".into()),
            other => other,
        })?;
    Ok(Json(TokenResponse::bearer(token)))
}
