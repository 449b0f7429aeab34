use tracing::{info, instrument, warn};

use super::dto::VoteDir;
use crate::{
    error::{AppError, AppResult},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Added,
    Removed,
}

impl VoteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            VoteOutcome::Added => "successfully added vote",
            VoteOutcome::Removed => "successfully deleted vote",
        }
    }
}

/// Casting an existing vote is a conflict and retracting a missing one is
/// not-found. The vote table's primary key settles concurrent casts and the
/// affected-row count of the delete settles concurrent retracts.
#[instrument(skip(store))]
pub async fn cast_or_retract(
    store: &dyn Store,
    user_id: i32,
    post_id: i32,
    dir: VoteDir,
) -> AppResult<VoteOutcome> {
    let mut tx = store.begin().await?;

    if !tx.post_exists(post_id).await? {
        return Err(AppError::NotFound(format!(
            "Post with id {} does not exist",
            post_id
        )));
    }

    let existing = tx.find_vote(user_id, post_id).await?;

    let outcome = match (dir, existing) {
        (VoteDir::Cast, Some(_)) => {
            warn!(user_id, post_id, "duplicate vote");
            return Err(AppError::Conflict(format!(
                "user {} has already voted on post {}",
                user_id, post_id
            )));
        }
        (VoteDir::Cast, None) => {
            tx.insert_vote(user_id, post_id).await?;
            VoteOutcome::Added
        }
        (VoteDir::Retract, existing) => {
            // the delete itself decides; a concurrent retract may have won
            if existing.is_none() || !tx.delete_vote(user_id, post_id).await? {
                return Err(AppError::NotFound("vote does not exist".into()));
            }
            VoteOutcome::Removed
        }
    };

    tx.commit().await?;
    info!(user_id, post_id, ?outcome, "vote applied");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        posts::{repo_types::PostInput, services as posts},
        state::AppState,
    };

    async fn setup(state: &AppState) -> (i32, i32) {
        let mut tx = state.store.begin().await.unwrap();
        let user = tx.insert_user("voter@example.com", "digest").await.unwrap();
        let post = tx
            .insert_post(
                user.id,
                &PostInput {
                    title: "abc".into(),
                    content: "cba".into(),
                    published: true,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (user.id, post.id)
    }

    #[tokio::test]
    async fn cast_twice_conflicts() {
        let state = AppState::fake();
        let store = state.store.as_ref();
        let (user_id, post_id) = setup(&state).await;

        let first = cast_or_retract(store, user_id, post_id, VoteDir::Cast).await.unwrap();
        assert_eq!(first, VoteOutcome::Added);
        assert_eq!(posts::get(store, post_id).await.unwrap().votes, 1);

        let second = cast_or_retract(store, user_id, post_id, VoteDir::Cast).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(posts::get(store, post_id).await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn retract_then_recast() {
        let state = AppState::fake();
        let store = state.store.as_ref();
        let (user_id, post_id) = setup(&state).await;

        cast_or_retract(store, user_id, post_id, VoteDir::Cast).await.unwrap();
        let removed = cast_or_retract(store, user_id, post_id, VoteDir::Retract)
            .await
            .unwrap();
        assert_eq!(removed, VoteOutcome::Removed);
        assert_eq!(posts::get(store, post_id).await.unwrap().votes, 0);

        let again = cast_or_retract(store, user_id, post_id, VoteDir::Cast).await.unwrap();
        assert_eq!(again, VoteOutcome::Added);
    }

    #[tokio::test]
    async fn retract_without_vote_is_not_found() {
        let state = AppState::fake();
        let (user_id, post_id) = setup(&state).await;
        let err = cast_or_retract(state.store.as_ref(), user_id, post_id, VoteDir::Retract)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn vote_on_missing_post_is_not_found() {
        let state = AppState::fake();
        let (user_id, _) = setup(&state).await;
        let err = cast_or_retract(state.store.as_ref(), user_id, 890, VoteDir::Cast)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("890")));
    }

    #[tokio::test]
    async fn concurrent_casts_admit_exactly_one() {
        let state = AppState::fake();
        let (user_id, post_id) = setup(&state).await;

        let a = {
            let store = state.store.clone();
            tokio::spawn(async move {
                cast_or_retract(store.as_ref(), user_id, post_id, VoteDir::Cast).await
            })
        };
        let b = {
            let store = state.store.clone();
            tokio::spawn(async move {
                cast_or_retract(store.as_ref(), user_id, post_id, VoteDir::Cast).await
            })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
    }

    #[tokio::test]
    async fn concurrent_retracts_remove_exactly_once() {
        let state = AppState::fake();
        let (user_id, post_id) = setup(&state).await;
        cast_or_retract(state.store.as_ref(), user_id, post_id, VoteDir::Cast)
            .await
            .unwrap();

        let spawn_retract = || {
            let store = state.store.clone();
            tokio::spawn(async move {
                cast_or_retract(store.as_ref(), user_id, post_id, VoteDir::Retract).await
            })
        };
        let (a, b) = (spawn_retract(), spawn_retract());
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Ok(VoteOutcome::Removed)))
                .count(),
            1
        );
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::NotFound(_)))));

        let mut tx = state.store.begin().await.unwrap();
        assert!(tx.find_vote(user_id, post_id).await.unwrap().is_none());
    }
}
