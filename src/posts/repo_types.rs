use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::users::repo_types::PublicUser;

/// Post record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub owner_id: i32,
}

/// The mutable fields of a post. Updates replace all of them.
#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

/// A post together with its owner's public record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub owner: PublicUser,
}

/// A post with the number of votes cast on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithVotes {
    #[serde(rename = "Post")]
    pub post: PostView,
    pub votes: i64,
}

/// Filter and window for post listings.
#[derive(Debug, Clone, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub skip: i64,
    #[serde(default)]
    pub search: String,
}

fn default_limit() -> i64 {
    10
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            skip: 0,
            search: String::new(),
        }
    }
}

/// Flat row produced by the post/owner/vote join.
#[derive(Debug, FromRow)]
pub struct PostRow {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: OffsetDateTime,
    pub owner_id: i32,
    pub owner_email: String,
    pub owner_created_at: OffsetDateTime,
    pub votes: i64,
}

impl From<PostRow> for PostWithVotes {
    fn from(r: PostRow) -> Self {
        Self {
            post: PostView {
                post: Post {
                    id: r.id,
                    title: r.title,
                    content: r.content,
                    published: r.published,
                    created_at: r.created_at,
                    owner_id: r.owner_id,
                },
                owner: PublicUser {
                    id: r.owner_id,
                    email: r.owner_email,
                    created_at: r.owner_created_at,
                },
            },
            votes: r.votes,
        }
    }
}
