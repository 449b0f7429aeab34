use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::{
    error::{conflict_message, AppError, AppResult},
    posts::repo_types::{Post, PostInput, PostQuery, PostView, PostWithVotes},
    users::repo_types::{PublicUser, User},
    votes::repo_types::Vote,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    posts: BTreeMap<i32, Post>,
    votes: BTreeSet<Vote>,
    last_user_id: i32,
    last_post_id: i32,
}

impl Tables {
    fn with_votes(&self, post: &Post) -> AppResult<PostWithVotes> {
        let owner = self
            .users
            .get(&post.owner_id)
            .ok_or_else(|| anyhow::anyhow!("post {} has no owner row", post.id))?;
        let votes = self.votes.iter().filter(|v| v.post_id == post.id).count() as i64;
        Ok(PostWithVotes {
            post: PostView {
                post: post.clone(),
                owner: PublicUser::from(owner),
            },
            votes,
        })
    }
}

/// In-process store with the same constraints as the Postgres schema.
/// Transactions are serialized: one holds the lock until commit or drop.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_user(&mut self, email: &str, password_hash: &str) -> AppResult<User> {
        if self.work.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict(
                conflict_message(Some("users_email_key")).into(),
            ));
        }
        self.work.last_user_id += 1;
        let user = User {
            id: self.work.last_user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.work.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&mut self, id: i32) -> AppResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(self.work.users.values().find(|u| u.email == email).cloned())
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<bool> {
        if self.work.users.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: BTreeSet<i32> = self
            .work
            .posts
            .values()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        self.work.posts.retain(|pid, _| !owned.contains(pid));
        self.work
            .votes
            .retain(|v| v.user_id != id && !owned.contains(&v.post_id));
        Ok(true)
    }

    async fn list_posts(&mut self, query: &PostQuery) -> AppResult<Vec<PostWithVotes>> {
        let skip = usize::try_from(query.skip).unwrap_or(0);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        self.work
            .posts
            .values()
            .filter(|p| p.title.contains(query.search.as_str()))
            .skip(skip)
            .take(limit)
            .map(|p| self.work.with_votes(p))
            .collect()
    }

    async fn post_with_votes(&mut self, id: i32) -> AppResult<Option<PostWithVotes>> {
        self.work
            .posts
            .get(&id)
            .map(|p| self.work.with_votes(p))
            .transpose()
    }

    async fn post_exists(&mut self, id: i32) -> AppResult<bool> {
        Ok(self.work.posts.contains_key(&id))
    }

    async fn post_for_update(&mut self, id: i32) -> AppResult<Option<Post>> {
        Ok(self.work.posts.get(&id).cloned())
    }

    async fn insert_post(&mut self, owner_id: i32, input: &PostInput) -> AppResult<Post> {
        if !self.work.users.contains_key(&owner_id) {
            return Err(AppError::NotFound(
                "referenced record does not exist".into(),
            ));
        }
        self.work.last_post_id += 1;
        let post = Post {
            id: self.work.last_post_id,
            title: input.title.clone(),
            content: input.content.clone(),
            published: input.published,
            created_at: OffsetDateTime::now_utc(),
            owner_id,
        };
        self.work.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&mut self, id: i32, input: &PostInput) -> AppResult<Post> {
        let post = self
            .work
            .posts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Post with {} was not found", id)))?;
        post.title = input.title.clone();
        post.content = input.content.clone();
        post.published = input.published;
        Ok(post.clone())
    }

    async fn delete_post(&mut self, id: i32) -> AppResult<()> {
        self.work.posts.remove(&id);
        self.work.votes.retain(|v| v.post_id != id);
        Ok(())
    }

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Option<Vote>> {
        let key = Vote { user_id, post_id };
        Ok(self.work.votes.get(&key).copied())
    }

    async fn insert_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Vote> {
        if !self.work.users.contains_key(&user_id) || !self.work.posts.contains_key(&post_id) {
            return Err(AppError::NotFound(
                "referenced record does not exist".into(),
            ));
        }
        let vote = Vote { user_id, post_id };
        if !self.work.votes.insert(vote) {
            return Err(AppError::Conflict(conflict_message(Some("votes_pkey")).into()));
        }
        Ok(vote)
    }

    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<bool> {
        Ok(self.work.votes.remove(&Vote { user_id, post_id }))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> PostInput {
        PostInput {
            title: title.into(),
            content: "body".into(),
            published: true,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user("a@example.com", "h").await.unwrap();
        let err = tx.insert_user("a@example.com", "h").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // email comparison is case-sensitive
        tx.insert_user("A@example.com", "h").await.unwrap();
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user("a@example.com", "h").await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.user_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_posts_and_votes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let alice = tx.insert_user("alice@example.com", "h").await.unwrap();
        let bob = tx.insert_user("bob@example.com", "h").await.unwrap();
        let alice_post = tx.insert_post(alice.id, &input("a")).await.unwrap();
        let bob_post = tx.insert_post(bob.id, &input("b")).await.unwrap();
        tx.insert_vote(bob.id, alice_post.id).await.unwrap();
        tx.insert_vote(alice.id, bob_post.id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_user(alice.id).await.unwrap());
        assert!(tx.post_with_votes(alice_post.id).await.unwrap().is_none());
        assert!(tx.find_vote(bob.id, alice_post.id).await.unwrap().is_none());
        let remaining = tx.post_with_votes(bob_post.id).await.unwrap().unwrap();
        assert_eq!(remaining.votes, 0);
        assert!(!tx.delete_user(alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_vote_is_a_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user("u@example.com", "h").await.unwrap();
        let post = tx.insert_post(user.id, &input("t")).await.unwrap();
        tx.insert_vote(user.id, post.id).await.unwrap();
        let err = tx.insert_vote(user.id, post.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_conflicts_do_not_leak_constraint_names() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user("u@example.com", "h").await.unwrap();
        let post = tx.insert_post(user.id, &input("t")).await.unwrap();
        tx.insert_vote(user.id, post.id).await.unwrap();

        match tx.insert_vote(user.id, post.id).await {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, "Vote already exists"),
            other => panic!("expected conflict, got {other:?}"),
        }

        match tx.insert_user("u@example.com", "h").await {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, "Email already registered"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_vote_reports_missing_row() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user("u@example.com", "h").await.unwrap();
        let post = tx.insert_post(user.id, &input("t")).await.unwrap();
        tx.insert_vote(user.id, post.id).await.unwrap();

        assert!(tx.delete_vote(user.id, post.id).await.unwrap());
        assert!(!tx.delete_vote(user.id, post.id).await.unwrap());
        assert!(!tx.delete_vote(user.id, 999).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_post_cascades_to_its_votes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let alice = tx.insert_user("alice@example.com", "h").await.unwrap();
        let bob = tx.insert_user("bob@example.com", "h").await.unwrap();
        let doomed = tx.insert_post(alice.id, &input("a")).await.unwrap();
        let kept = tx.insert_post(alice.id, &input("b")).await.unwrap();
        tx.insert_vote(alice.id, doomed.id).await.unwrap();
        tx.insert_vote(bob.id, doomed.id).await.unwrap();
        tx.insert_vote(bob.id, kept.id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete_post(doomed.id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.post_exists(doomed.id).await.unwrap());
        assert!(tx.find_vote(alice.id, doomed.id).await.unwrap().is_none());
        assert!(tx.find_vote(bob.id, doomed.id).await.unwrap().is_none());
        assert!(tx.find_vote(bob.id, kept.id).await.unwrap().is_some());
        assert_eq!(tx.post_with_votes(kept.id).await.unwrap().unwrap().votes, 1);
    }

    #[tokio::test]
    async fn post_exists_tracks_inserts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user("u@example.com", "h").await.unwrap();
        assert!(!tx.post_exists(1).await.unwrap());
        let post = tx.insert_post(user.id, &input("t")).await.unwrap();
        assert!(tx.post_exists(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn post_requires_existing_owner() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_post(42, &input("t")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
