//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `StudyStore` and `AccountService` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_tracker_core::domain::{
    CodeSnippet, Exam, Identity, TopicRow, TopicStatus, User, UserCredentials,
};
use study_tracker_core::ports::{AccountService, PortError, PortResult, StudyStore};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StudyStore` and `AccountService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a zero-row update or delete to `NotFound`.
fn expect_affected(result: sqlx::postgres::PgQueryResult, what: String) -> PortResult<()> {
    if result.rows_affected() == 0 {
        Err(PortError::NotFound(what))
    } else {
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: String,
    number: Option<i32>,
    title: String,
    status: String,
    parent_id: Option<String>,
}
impl TopicRecord {
    fn to_domain(self) -> TopicRow {
        let status = self.status.parse::<TopicStatus>().unwrap_or_else(|e| {
            warn!("Topic {}: {}, treating as not_started", self.id, e);
            TopicStatus::NotStarted
        });
        TopicRow {
            id: self.id,
            number: self.number,
            title: self.title,
            status,
            parent_id: self.parent_id,
        }
    }
}

#[derive(FromRow)]
struct SnippetRecord {
    id: String,
    topic_id: String,
    title: String,
    code: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}
impl SnippetRecord {
    fn to_domain(self) -> CodeSnippet {
        CodeSnippet {
            id: self.id,
            topic_id: self.topic_id,
            title: self.title,
            code: self.code,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ExamRecord {
    id: String,
    unit: String,
    topics: String,
    exam_date: DateTime<Utc>,
    grade: Option<f64>,
    created_at: DateTime<Utc>,
}
impl ExamRecord {
    fn to_domain(self) -> Exam {
        Exam {
            id: self.id,
            unit: self.unit,
            topics: self.topics,
            exam_date: self.exam_date,
            grade: self.grade,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `StudyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyStore for DbAdapter {
    async fn select_topics(&self, owner: Identity) -> PortResult<Vec<TopicRow>> {
        let records = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, number, title, status, parent_id FROM topics \
             WHERE user_id = $1 ORDER BY number ASC NULLS LAST, position ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_topics(&self, owner: Identity, rows: &[TopicRow]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // Every row in the transaction shares one `NOW()`, so insertion order
        // is kept in `position`, continuing after any rows already stored.
        let start: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM topics WHERE user_id = $1",
        )
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        for (row, position) in rows.iter().zip(start..) {
            sqlx::query(
                "INSERT INTO topics (id, user_id, number, title, status, parent_id, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&row.id)
            .bind(owner)
            .bind(row.number)
            .bind(&row.title)
            .bind(row.status.as_str())
            .bind(&row.parent_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn update_topic_status(
        &self,
        owner: Identity,
        topic_id: &str,
        status: TopicStatus,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE topics SET status = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
        )
        .bind(status.as_str())
        .bind(topic_id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_affected(result, format!("Topic {} not found", topic_id))
    }

    async fn select_snippets(&self, owner: Identity) -> PortResult<Vec<CodeSnippet>> {
        let records = sqlx::query_as::<_, SnippetRecord>(
            "SELECT id, topic_id, title, code, description, created_at FROM code_snippets \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO code_snippets (id, user_id, topic_id, title, code, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&snippet.id)
        .bind(owner)
        .bind(&snippet.topic_id)
        .bind(&snippet.title)
        .bind(&snippet.code)
        .bind(&snippet.description)
        .bind(snippet.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE code_snippets SET topic_id = $1, title = $2, code = $3, description = $4, \
             updated_at = NOW() WHERE id = $5 AND user_id = $6",
        )
        .bind(&snippet.topic_id)
        .bind(&snippet.title)
        .bind(&snippet.code)
        .bind(&snippet.description)
        .bind(&snippet.id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_affected(result, format!("Snippet {} not found", snippet.id))
    }

    async fn delete_snippet(&self, owner: Identity, snippet_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM code_snippets WHERE id = $1 AND user_id = $2")
            .bind(snippet_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn select_exams(&self, owner: Identity) -> PortResult<Vec<Exam>> {
        let records = sqlx::query_as::<_, ExamRecord>(
            "SELECT id, unit, topics, exam_date, grade, created_at FROM exams \
             WHERE user_id = $1 ORDER BY exam_date DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO exams (id, user_id, unit, topics, exam_date, grade, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&exam.id)
        .bind(owner)
        .bind(&exam.unit)
        .bind(&exam.topics)
        .bind(exam.exam_date)
        .bind(exam.grade)
        .bind(exam.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE exams SET unit = $1, topics = $2, exam_date = $3, grade = $4, \
             updated_at = NOW() WHERE id = $5 AND user_id = $6",
        )
        .bind(&exam.unit)
        .bind(&exam.topics)
        .bind(exam.exam_date)
        .bind(exam.grade)
        .bind(&exam.id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_affected(result, format!("Exam {} not found", exam.id))
    }

    async fn delete_exam(&self, owner: Identity, exam_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM exams WHERE id = $1 AND user_id = $2")
            .bind(exam_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `AccountService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
