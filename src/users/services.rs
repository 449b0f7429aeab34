use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::repo_types::User;
use crate::{
    auth::password::hash_password,
    error::{AppError, AppResult},
    store::Store,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Creates an account. The email is stored exactly as given.
#[instrument(skip(store, password))]
pub async fn register(store: &dyn Store, email: &str, password: &str) -> AppResult<User> {
    if !is_valid_email(email) {
        warn!(email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    let hash = hash_password(password)?;

    let mut tx = store.begin().await?;
    if tx.user_by_email(email).await?.is_some() {
        warn!(email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    let user = tx.insert_user(email, &hash).await?;
    tx.commit().await?;

    info!(user_id = user.id, "user registered");
    Ok(user)
}

#[instrument(skip(store))]
pub async fn get_user(store: &dyn Store, id: i32) -> AppResult<User> {
    let mut tx = store.begin().await?;
    tx.user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with {} was not found", id)))
}

/// Removes the account along with its posts and votes. Tokens already
/// issued to it stay signed-valid but no longer resolve.
#[instrument(skip(store))]
pub async fn delete_user(store: &dyn Store, id: i32) -> AppResult<()> {
    let mut tx = store.begin().await?;
    if !tx.delete_user(id).await? {
        return Err(AppError::NotFound(format!("User with {} was not found", id)));
    }
    tx.commit().await?;
    info!(user_id = id, "user deleted");
    Ok(())
}
