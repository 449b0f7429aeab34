use tracing::{info, instrument, warn};

use super::repo_types::{Post, PostInput, PostQuery, PostView, PostWithVotes};
use crate::{
    error::{AppError, AppResult},
    store::{Store, StoreTx},
};

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Post with {} was not found", id))
}

fn validate(input: &PostInput) -> AppResult<()> {
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    Ok(())
}

fn ensure_owner(post: &Post, caller_id: i32) -> AppResult<()> {
    if post.owner_id != caller_id {
        warn!(post_id = post.id, owner_id = post.owner_id, caller_id, "not the owner");
        return Err(AppError::Forbidden("You are not the owner of the post".into()));
    }
    Ok(())
}

async fn with_owner(tx: &mut dyn StoreTx, post: Post) -> AppResult<PostView> {
    let owner = tx
        .user_by_id(post.owner_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("post {} references missing owner", post.id))?;
    Ok(PostView {
        post,
        owner: (&owner).into(),
    })
}

/// Every post is visible to every authenticated caller.
#[instrument(skip(store))]
pub async fn list(store: &dyn Store, query: &PostQuery) -> AppResult<Vec<PostWithVotes>> {
    if query.limit < 0 || query.skip < 0 {
        return Err(AppError::Validation("limit and skip must not be negative".into()));
    }
    let mut tx = store.begin().await?;
    tx.list_posts(query).await
}

#[instrument(skip(store))]
pub async fn get(store: &dyn Store, id: i32) -> AppResult<PostWithVotes> {
    let mut tx = store.begin().await?;
    tx.post_with_votes(id).await?.ok_or_else(|| not_found(id))
}

#[instrument(skip(store, input))]
pub async fn create(store: &dyn Store, owner_id: i32, input: &PostInput) -> AppResult<PostView> {
    validate(input)?;
    let mut tx = store.begin().await?;
    let post = tx.insert_post(owner_id, input).await?;
    let view = with_owner(&mut *tx, post).await?;
    tx.commit().await?;
    info!(post_id = view.post.id, owner_id, "post created");
    Ok(view)
}

/// Replaces title, content and published in one step.
#[instrument(skip(store, input))]
pub async fn update(
    store: &dyn Store,
    id: i32,
    caller_id: i32,
    input: &PostInput,
) -> AppResult<PostView> {
    let mut tx = store.begin().await?;
    let post = tx.post_for_update(id).await?.ok_or_else(|| not_found(id))?;
    ensure_owner(&post, caller_id)?;
    validate(input)?;
    let post = tx.update_post(id, input).await?;
    let view = with_owner(&mut *tx, post).await?;
    tx.commit().await?;
    info!(post_id = id, "post updated");
    Ok(view)
}

#[instrument(skip(store))]
pub async fn delete(store: &dyn Store, id: i32, caller_id: i32) -> AppResult<()> {
    let mut tx = store.begin().await?;
    let post = tx.post_for_update(id).await?.ok_or_else(|| not_found(id))?;
    ensure_owner(&post, caller_id)?;
    tx.delete_post(id).await?;
    tx.commit().await?;
    info!(post_id = id, "post deleted");
    Ok(())
}
