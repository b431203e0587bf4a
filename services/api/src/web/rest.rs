//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.
//!
//! Every handler works on the caller's workspace: reads come straight from the
//! cached snapshots, writes go through the cache so the store and the pushed
//! WebSocket snapshots stay in step.

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_tracker_core::cache::{CacheError, LoadReport};
use study_tracker_core::domain::{
    is_passed, parse_date, CodeSnippet, Exam, ExamDraft, Identity, SnippetDraft, SubTopic, Topic,
    TopicStatus,
};
use study_tracker_core::grouping::{group_snippets_by_topic, SnippetGroup};
use study_tracker_core::ports::PortError;
use study_tracker_core::workspace::Workspace;
use tracing::{error, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        session_handler,
        list_topics_handler,
        cycle_topic_handler,
        cycle_sub_topic_handler,
        list_snippets_handler,
        grouped_snippets_handler,
        create_snippet_handler,
        update_snippet_handler,
        delete_snippet_handler,
        list_exams_handler,
        create_exam_handler,
        update_exam_handler,
        delete_exam_handler,
    ),
    components(
        schemas(
            SignupRequest, LoginRequest, AuthResponse, SessionResponse, TopicResponse,
            SubTopicResponse, StatusResponse, SnippetResponse, SnippetGroupResponse,
            SnippetPayload, ExamResponse, ExamPayload
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Topic progress, code snippets and exams for a Java course.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Who the request acts as and how their data load went.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    user_id: Uuid,
    /// The initial load has finished.
    ready: bool,
    /// The default curriculum was written for this user.
    seeded: bool,
    /// Collections that failed to load, with the reason.
    errors: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubTopicResponse {
    id: String,
    title: String,
    /// One of `not_started`, `in_progress`, `completed`.
    status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    id: String,
    number: i32,
    title: String,
    status: String,
    sub_topics: Vec<SubTopicResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    id: String,
    status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnippetResponse {
    id: String,
    topic_id: String,
    title: String,
    code: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnippetGroupResponse {
    topic_id: String,
    topic_title: String,
    snippets: Vec<SnippetResponse>,
}

/// Fields for creating or replacing a snippet.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnippetPayload {
    #[serde(default)]
    topic_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamResponse {
    id: String,
    unit: String,
    topics: String,
    exam_date: DateTime<Utc>,
    grade: Option<f64>,
    created_at: DateTime<Utc>,
    /// `pending`, `passed` or `failed`.
    grade_status: String,
    passed: Option<bool>,
    /// `past`, `today`, `soon` or `upcoming`.
    timing: String,
}

/// Fields for creating or replacing an exam.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamPayload {
    #[serde(default)]
    unit: String,
    #[serde(default)]
    topics: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[serde(default)]
    exam_date: String,
    #[serde(default)]
    grade: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SnippetQuery {
    /// Only return snippets saved against this topic or subtopic id.
    topic_id: Option<String>,
}

//=========================================================================================
// Conversions
//=========================================================================================

fn sub_topic_response(sub: &SubTopic) -> SubTopicResponse {
    SubTopicResponse {
        id: sub.id.clone(),
        title: sub.title.clone(),
        status: sub.status.as_str().to_string(),
    }
}

fn topic_response(topic: &Topic) -> TopicResponse {
    TopicResponse {
        id: topic.id.clone(),
        number: topic.number,
        title: topic.title.clone(),
        status: topic.status.as_str().to_string(),
        sub_topics: topic.sub_topics.iter().map(sub_topic_response).collect(),
    }
}

fn snippet_response(snippet: &CodeSnippet) -> SnippetResponse {
    SnippetResponse {
        id: snippet.id.clone(),
        topic_id: snippet.topic_id.clone(),
        title: snippet.title.clone(),
        code: snippet.code.clone(),
        description: snippet.description.clone(),
        created_at: snippet.created_at,
    }
}

fn group_response(group: SnippetGroup) -> SnippetGroupResponse {
    SnippetGroupResponse {
        topic_id: group.topic_id,
        topic_title: group.topic_title,
        snippets: group.snippets.iter().map(snippet_response).collect(),
    }
}

fn exam_response(exam: &Exam) -> ExamResponse {
    let today = Utc::now().date_naive();
    ExamResponse {
        id: exam.id.clone(),
        unit: exam.unit.clone(),
        topics: exam.topics.clone(),
        exam_date: exam.exam_date,
        grade: exam.grade,
        created_at: exam.created_at,
        grade_status: exam.grade_status().as_str().to_string(),
        passed: is_passed(exam.grade),
        timing: exam.timing(today).as_str().to_string(),
    }
}

fn status_response(id: &str, status: TopicStatus) -> StatusResponse {
    StatusResponse {
        id: id.to_string(),
        status: status.as_str().to_string(),
    }
}


impl From<SnippetPayload> for SnippetDraft {
    fn from(payload: SnippetPayload) -> Self {
        SnippetDraft {
            topic_id: payload.topic_id,
            title: payload.title,
            code: payload.code,
            description: payload.description,
        }
    }
}

impl TryFrom<ExamPayload> for ExamDraft {
    type Error = CacheError;

    fn try_from(payload: ExamPayload) -> Result<Self, Self::Error> {
        let exam_date = parse_date(payload.exam_date.trim())
            .ok_or_else(|| CacheError::Validation("examDate".to_string()))?;
        Ok(ExamDraft {
            unit: payload.unit,
            topics: payload.topics,
            exam_date,
            grade: payload.grade,
        })
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type RestError = (StatusCode, String);

fn reject(e: CacheError) -> RestError {
    let status = match &e {
        CacheError::Validation(_) => StatusCode::BAD_REQUEST,
        CacheError::NotAuthenticated | CacheError::Remote(PortError::Unauthorized) => {
            StatusCode::UNAUTHORIZED
        }
        CacheError::NotFound(_) | CacheError::Remote(PortError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        CacheError::Busy(_) => StatusCode::CONFLICT,
        CacheError::Remote(PortError::Unexpected(_)) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (status, e.to_string())
}

fn load_errors(report: &LoadReport) -> Vec<String> {
    [
        ("topics", &report.topics),
        ("snippets", &report.snippets),
        ("exams", &report.exams),
    ]
    .into_iter()
    .filter_map(|(name, err)| err.as_ref().map(|e| format!("{name}: {e}")))
    .collect()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Describe the current session.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "The caller's session", body = SessionResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn session_handler(
    Extension(user_id): Extension<Identity>,
    Extension(ws): Extension<Arc<Workspace>>,
) -> Json<SessionResponse> {
    let report = ws.load_report();
    Json(SessionResponse {
        user_id,
        ready: report.is_some(),
        seeded: report.is_some_and(|r| r.seeded),
        errors: report.map(load_errors).unwrap_or_default(),
    })
}

/// List the topic tree in curriculum order.
#[utoipa::path(
    get,
    path = "/topics",
    responses((status = 200, description = "All topics with their subtopics", body = [TopicResponse]))
)]
pub async fn list_topics_handler(
    Extension(ws): Extension<Arc<Workspace>>,
) -> Json<Vec<TopicResponse>> {
    Json(ws.cache.topics().iter().map(topic_response).collect())
}

/// Advance a topic to its next status.
#[utoipa::path(
    post,
    path = "/topics/{topic_id}/cycle",
    params(("topic_id" = String, Path, description = "Root topic id")),
    responses(
        (status = 200, description = "The new status", body = StatusResponse),
        (status = 404, description = "Unknown topic"),
        (status = 409, description = "Another change to this topic is in progress"),
        (status = 502, description = "The store rejected the change")
    )
)]
pub async fn cycle_topic_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path(topic_id): Path<String>,
) -> Result<Json<StatusResponse>, RestError> {
    let status = ws.cache.cycle_topic_status(&topic_id).await.map_err(reject)?;
    Ok(Json(status_response(&topic_id, status)))
}

/// Advance one subtopic to its next status.
#[utoipa::path(
    post,
    path = "/topics/{topic_id}/subtopics/{sub_topic_id}/cycle",
    params(
        ("topic_id" = String, Path, description = "Parent topic id"),
        ("sub_topic_id" = String, Path, description = "Subtopic id")
    ),
    responses(
        (status = 200, description = "The new status", body = StatusResponse),
        (status = 404, description = "Unknown topic or subtopic"),
        (status = 409, description = "Another change to this subtopic is in progress"),
        (status = 502, description = "The store rejected the change")
    )
)]
pub async fn cycle_sub_topic_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path((topic_id, sub_topic_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, RestError> {
    let status = ws
        .cache
        .cycle_sub_topic_status(&topic_id, &sub_topic_id)
        .await
        .map_err(reject)?;
    Ok(Json(status_response(&sub_topic_id, status)))
}

/// List snippets, newest first.
#[utoipa::path(
    get,
    path = "/snippets",
    params(SnippetQuery),
    responses((status = 200, description = "Snippets", body = [SnippetResponse]))
)]
pub async fn list_snippets_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Query(query): Query<SnippetQuery>,
) -> Json<Vec<SnippetResponse>> {
    let snippets = match query.topic_id {
        Some(topic_id) => ws.cache.snippets_for_topic(&topic_id),
        None => ws.cache.snippets().to_vec(),
    };
    Json(snippets.iter().map(snippet_response).collect())
}

/// List snippets grouped under their topic label.
#[utoipa::path(
    get,
    path = "/snippets/grouped",
    responses((status = 200, description = "Snippet groups", body = [SnippetGroupResponse]))
)]
pub async fn grouped_snippets_handler(
    Extension(ws): Extension<Arc<Workspace>>,
) -> Json<Vec<SnippetGroupResponse>> {
    let groups = group_snippets_by_topic(&ws.cache.snippets(), &ws.cache.topics());
    Json(groups.into_iter().map(group_response).collect())
}

/// Save a new snippet.
#[utoipa::path(
    post,
    path = "/snippets",
    request_body = SnippetPayload,
    responses(
        (status = 201, description = "Snippet saved", body = SnippetResponse),
        (status = 400, description = "A required field is empty"),
        (status = 502, description = "The store rejected the change")
    )
)]
pub async fn create_snippet_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Json(payload): Json<SnippetPayload>,
) -> Result<impl IntoResponse, RestError> {
    let snippet = ws.cache.add_snippet(payload.into()).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(snippet_response(&snippet))))
}

/// Replace a snippet's fields.
#[utoipa::path(
    put,
    path = "/snippets/{id}",
    params(("id" = String, Path, description = "Snippet id")),
    request_body = SnippetPayload,
    responses(
        (status = 200, description = "Snippet updated", body = SnippetResponse),
        (status = 400, description = "A required field is empty"),
        (status = 404, description = "Unknown snippet"),
        (status = 409, description = "Another change to this snippet is in progress")
    )
)]
pub async fn update_snippet_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path(id): Path<String>,
    Json(payload): Json<SnippetPayload>,
) -> Result<Json<SnippetResponse>, RestError> {
    let snippet = ws
        .cache
        .update_snippet(&id, payload.into())
        .await
        .map_err(reject)?;
    Ok(Json(snippet_response(&snippet)))
}

/// Delete a snippet.
#[utoipa::path(
    delete,
    path = "/snippets/{id}",
    params(("id" = String, Path, description = "Snippet id")),
    responses(
        (status = 204, description = "Snippet deleted"),
        (status = 409, description = "Another change to this snippet is in progress")
    )
)]
pub async fn delete_snippet_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RestError> {
    ws.cache.delete_snippet(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List exams, latest date first.
#[utoipa::path(
    get,
    path = "/exams",
    responses((status = 200, description = "Exams", body = [ExamResponse]))
)]
pub async fn list_exams_handler(
    Extension(ws): Extension<Arc<Workspace>>,
) -> Json<Vec<ExamResponse>> {
    Json(ws.cache.exams().iter().map(exam_response).collect())
}

/// Schedule an exam.
#[utoipa::path(
    post,
    path = "/exams",
    request_body = ExamPayload,
    responses(
        (status = 201, description = "Exam saved", body = ExamResponse),
        (status = 400, description = "A required field is empty or invalid"),
        (status = 502, description = "The store rejected the change")
    )
)]
pub async fn create_exam_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Json(payload): Json<ExamPayload>,
) -> Result<impl IntoResponse, RestError> {
    let draft = ExamDraft::try_from(payload).map_err(reject)?;
    let exam = ws.cache.add_exam(draft).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(exam_response(&exam))))
}

/// Replace an exam's fields, including its grade.
#[utoipa::path(
    put,
    path = "/exams/{id}",
    params(("id" = String, Path, description = "Exam id")),
    request_body = ExamPayload,
    responses(
        (status = 200, description = "Exam updated", body = ExamResponse),
        (status = 400, description = "A required field is empty or invalid"),
        (status = 404, description = "Unknown exam"),
        (status = 409, description = "Another change to this exam is in progress")
    )
)]
pub async fn update_exam_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path(id): Path<String>,
    Json(payload): Json<ExamPayload>,
) -> Result<Json<ExamResponse>, RestError> {
    let draft = ExamDraft::try_from(payload).map_err(reject)?;
    let exam = ws.cache.update_exam(&id, draft).await.map_err(reject)?;
    Ok(Json(exam_response(&exam)))
}

/// Delete an exam.
#[utoipa::path(
    delete,
    path = "/exams/{id}",
    params(("id" = String, Path, description = "Exam id")),
    responses(
        (status = 204, description = "Exam deleted"),
        (status = 409, description = "Another change to this exam is in progress")
    )
)]
pub async fn delete_exam_handler(
    Extension(ws): Extension<Arc<Workspace>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RestError> {
    ws.cache.delete_exam(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_errors_map_to_status_codes() {
        let cases = [
            (CacheError::Validation("title".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (CacheError::NotFound("exam e1".into()), StatusCode::NOT_FOUND),
            (CacheError::Busy("snippet:s1".into()), StatusCode::CONFLICT),
            (
                CacheError::Remote(PortError::Unexpected("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::Remote(PortError::NotFound("gone".into())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(reject(err).0, expected);
        }
    }

    #[test]
    fn exam_payload_accepts_plain_dates() {
        let payload = ExamPayload {
            unit: "UT3".into(),
            topics: "Loops".into(),
            exam_date: "2024-05-20".into(),
            grade: None,
        };
        let draft = ExamDraft::try_from(payload).unwrap();
        assert_eq!(draft.exam_date.to_rfc3339(), "2024-05-20T00:00:00+00:00");

        let bad = ExamPayload {
            unit: "UT3".into(),
            topics: "Loops".into(),
            exam_date: "next tuesday".into(),
            grade: None,
        };
        assert_eq!(
            ExamDraft::try_from(bad).unwrap_err(),
            CacheError::Validation("examDate".into())
        );
    }
}
