use tracing::{info, instrument, warn};

use super::{jwt::JwtKeys, password::verify_password};
use crate::{
    error::{AppError, AppResult},
    store::Store,
    users::repo_types::User,
};

/// Checks an email/password pair and issues an access token for it.
/// Unknown email and wrong password both fail with `InvalidCredential`.
#[instrument(skip(store, keys, password))]
pub async fn login(
    store: &dyn Store,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> AppResult<String> {
    let user = {
        let mut tx = store.begin().await?;
        tx.user_by_email(email).await?
    };

    let Some(user) = user else {
        warn!(email, "login unknown email");
        return Err(AppError::InvalidCredential);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredential);
    }

    let token = keys.issue(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(token)
}

/// Maps a bearer token to the user it names. A valid token for a user that
/// no longer exists is rejected the same way as a bad token.
///
/// Tokens are not revocable; deleting a user is only noticed here, at the
/// next lookup.
#[instrument(skip_all)]
pub async fn resolve(store: &dyn Store, keys: &JwtKeys, token: &str) -> AppResult<User> {
    let user_id = keys.verify(token)?;
    let mut tx = store.begin().await?;
    tx.user_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id, "token subject no longer exists");
        AppError::InvalidCredential
    })
}
