use async_trait::async_trait;

use crate::{
    error::AppResult,
    posts::repo_types::{Post, PostInput, PostQuery, PostWithVotes},
    users::repo_types::User,
    votes::repo_types::Vote,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Source of transactions over users, posts and votes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

/// One open transaction. Dropping it without `commit` discards every write
/// made through it.
///
/// Implementations enforce: unique user email, unique (user, post) vote,
/// posts referencing an existing owner, and cascade deletes from users to
/// posts and votes and from posts to votes. Violations surface as
/// `AppError::Conflict` or `AppError::NotFound`.
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_user(&mut self, email: &str, password_hash: &str) -> AppResult<User>;
    async fn user_by_id(&mut self, id: i32) -> AppResult<Option<User>>;
    async fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>>;
    /// Returns false when no such user existed.
    async fn delete_user(&mut self, id: i32) -> AppResult<bool>;

    /// Title substring filter, ascending id, then offset/limit.
    async fn list_posts(&mut self, query: &PostQuery) -> AppResult<Vec<PostWithVotes>>;
    async fn post_with_votes(&mut self, id: i32) -> AppResult<Option<PostWithVotes>>;
    async fn post_exists(&mut self, id: i32) -> AppResult<bool>;
    /// Fetches a post and holds it against concurrent writers until the
    /// transaction ends.
    async fn post_for_update(&mut self, id: i32) -> AppResult<Option<Post>>;
    async fn insert_post(&mut self, owner_id: i32, input: &PostInput) -> AppResult<Post>;
    async fn update_post(&mut self, id: i32, input: &PostInput) -> AppResult<Post>;
    async fn delete_post(&mut self, id: i32) -> AppResult<()>;

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Option<Vote>>;
    async fn insert_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Vote>;
    /// Returns false when the vote was already gone, including when a
    /// concurrent transaction removed it first.
    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
