use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    posts::repo_types::{Post, PostInput, PostQuery, PostRow, PostWithVotes},
    users::repo_types::User,
    votes::repo_types::Vote,
};

const POST_WITH_VOTES_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.published, p.created_at, p.owner_id,
           u.email AS owner_email, u.created_at AS owner_created_at,
           COUNT(v.post_id) AS votes
    FROM posts p
    JOIN users u ON u.id = p.owner_id
    LEFT JOIN votes v ON v.post_id = p.id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_user(&mut self, email: &str, password_hash: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn user_by_id(&mut self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<bool> {
        // posts and votes go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_posts(&mut self, query: &PostQuery) -> AppResult<Vec<PostWithVotes>> {
        let sql = format!(
            r#"{POST_WITH_VOTES_SELECT}
            WHERE ($1 = '' OR strpos(p.title, $1) > 0)
            GROUP BY p.id, u.id
            ORDER BY p.id
            LIMIT $2 OFFSET $3"#
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&query.search)
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(PostWithVotes::from).collect())
    }

    async fn post_with_votes(&mut self, id: i32) -> AppResult<Option<PostWithVotes>> {
        let sql = format!(
            r#"{POST_WITH_VOTES_SELECT}
            WHERE p.id = $1
            GROUP BY p.id, u.id"#
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(PostWithVotes::from))
    }

    async fn post_exists(&mut self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn post_for_update(&mut self, id: i32) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, published, created_at, owner_id
            FROM posts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(post)
    }

    async fn insert_post(&mut self, owner_id: i32, input: &PostInput) -> AppResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, published, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, content, published, created_at, owner_id
            "#,
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.published)
        .bind(owner_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(post)
    }

    async fn update_post(&mut self, id: i32, input: &PostInput) -> AppResult<Post> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $2, content = $3, published = $4
            WHERE id = $1
            RETURNING id, title, content, published, created_at, owner_id
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.published)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with {} was not found", id)))
    }

    async fn delete_post(&mut self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"SELECT user_id, post_id FROM votes WHERE user_id = $1 AND post_id = $2"#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(vote)
    }

    async fn insert_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<Vote> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (user_id, post_id)
            VALUES ($1, $2)
            RETURNING user_id, post_id
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(vote)
    }

    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> AppResult<bool> {
        // the row lock taken by DELETE makes a racing retract see 0 rows
        let res = sqlx::query("DELETE FROM votes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
