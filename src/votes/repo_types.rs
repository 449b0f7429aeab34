use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user's vote on a post. Presence is the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub user_id: i32,
    pub post_id: i32,
}
