//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete row store and account backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{CodeSnippet, Exam, Identity, TopicRow, TopicStatus, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, filesystem).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The durable row store behind the data cache.
///
/// Every call carries the owning identity and implementations must filter on it,
/// for reads and writes alike. Selects return rows in display order: topics by
/// `number` ascending, snippets by `created_at` descending, exams by `exam_date`
/// descending. Rows without a `number` (subtopics) come back in the order they
/// were passed to `insert_topics`; children of one parent must never be
/// reordered relative to each other.
#[async_trait]
pub trait StudyStore: Send + Sync {
    // --- Topics ---
    async fn select_topics(&self, owner: Identity) -> PortResult<Vec<TopicRow>>;

    async fn insert_topics(&self, owner: Identity, rows: &[TopicRow]) -> PortResult<()>;

    /// Sets the status of a single row, root or child, by id.
    async fn update_topic_status(
        &self,
        owner: Identity,
        topic_id: &str,
        status: TopicStatus,
    ) -> PortResult<()>;

    // --- Code Snippets ---
    async fn select_snippets(&self, owner: Identity) -> PortResult<Vec<CodeSnippet>>;

    async fn insert_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()>;

    async fn update_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()>;

    async fn delete_snippet(&self, owner: Identity, snippet_id: &str) -> PortResult<()>;

    // --- Exams ---
    async fn select_exams(&self, owner: Identity) -> PortResult<Vec<Exam>>;

    async fn insert_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()>;

    async fn update_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()>;

    async fn delete_exam(&self, owner: Identity, exam_id: &str) -> PortResult<()>;
}

/// Email/password accounts and the cookie sessions issued for them.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live (unexpired) session to its user.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
