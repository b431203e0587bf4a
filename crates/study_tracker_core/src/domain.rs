//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the core data structures for the study tracker.
//! These structs are independent of any database. Their serde shape is the
//! camelCase JSON contract shared with the browser client and the local file store.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The authenticated user that scopes every read and write.
pub type Identity = Uuid;

/// Minimum grade that counts as a pass.
pub const PASS_THRESHOLD: f64 = 5.0;

//=========================================================================================
// Curriculum
//=========================================================================================

/// Progress of a topic or subtopic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TopicStatus {
    /// The next status in the `not_started → in_progress → completed` cycle.
    pub fn next(self) -> Self {
        match self {
            TopicStatus::NotStarted => TopicStatus::InProgress,
            TopicStatus::InProgress => TopicStatus::Completed,
            TopicStatus::Completed => TopicStatus::NotStarted,
        }
    }

    /// Computes the next status from a stored string. Anything unrecognised
    /// restarts the cycle at `not_started`.
    pub fn cycle_raw(raw: &str) -> Self {
        raw.parse::<TopicStatus>()
            .map(TopicStatus::next)
            .unwrap_or(TopicStatus::NotStarted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::NotStarted => "not_started",
            TopicStatus::InProgress => "in_progress",
            TopicStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TopicStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TopicStatus::NotStarted),
            "in_progress" => Ok(TopicStatus::InProgress),
            "completed" => Ok(TopicStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A second-level curriculum entry. Never has children of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTopic {
    pub id: String,
    pub title: String,
    pub status: TopicStatus,
}

/// A root curriculum entry. `sub_topics` is either empty or the ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub number: i32,
    pub title: String,
    pub status: TopicStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_topics: Vec<SubTopic>,
}

impl Topic {
    pub fn sub_topic(&self, sub_topic_id: &str) -> Option<&SubTopic> {
        self.sub_topics.iter().find(|s| s.id == sub_topic_id)
    }
}

/// The flat storage shape of a topic or subtopic: subtopics carry `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRow {
    pub id: String,
    pub number: Option<i32>,
    pub title: String,
    pub status: TopicStatus,
    pub parent_id: Option<String>,
}

//=========================================================================================
// Code Snippets
//=========================================================================================

/// A piece of code the user saved against a topic or subtopic id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnippet {
    pub id: String,
    pub topic_id: String,
    pub title: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User-supplied snippet fields, used for both creation and full replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetDraft {
    pub topic_id: String,
    pub title: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SnippetDraft {
    /// Returns the name of the first missing required field.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.topic_id.trim().is_empty() {
            Some("topicId")
        } else if self.title.trim().is_empty() {
            Some("title")
        } else if self.code.trim().is_empty() {
            Some("code")
        } else {
            None
        }
    }

    pub fn into_snippet(self, id: String, created_at: DateTime<Utc>) -> CodeSnippet {
        CodeSnippet {
            id,
            topic_id: self.topic_id,
            title: self.title,
            code: self.code,
            description: self.description.filter(|d| !d.trim().is_empty()),
            created_at,
        }
    }
}

//=========================================================================================
// Exams
//=========================================================================================

/// A scheduled or graded exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub unit: String,
    pub topics: String,
    pub exam_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Exam {
    pub fn grade_status(&self) -> GradeStatus {
        GradeStatus::from_grade(self.grade)
    }

    /// Where the exam falls relative to `today` (compared by calendar date).
    pub fn timing(&self, today: NaiveDate) -> ExamTiming {
        let days = (self.exam_date.date_naive() - today).num_days();
        match days {
            d if d < 0 => ExamTiming::Past,
            0 => ExamTiming::Today,
            1..=7 => ExamTiming::Soon,
            _ => ExamTiming::Upcoming,
        }
    }
}

/// User-supplied exam fields, used for both creation and full replacement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDraft {
    pub unit: String,
    pub topics: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub exam_date: DateTime<Utc>,
    #[serde(default)]
    pub grade: Option<f64>,
}

impl ExamDraft {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.unit.trim().is_empty() {
            Some("unit")
        } else if self.topics.trim().is_empty() {
            Some("topics")
        } else if self.grade.is_some_and(|g| !g.is_finite()) {
            Some("grade")
        } else {
            None
        }
    }

    pub fn into_exam(self, id: String, created_at: DateTime<Utc>) -> Exam {
        Exam {
            id,
            unit: self.unit,
            topics: self.topics,
            exam_date: self.exam_date,
            grade: self.grade,
            created_at,
        }
    }
}

/// Derived outcome of an exam grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Pending,
    Passed,
    Failed,
}

impl GradeStatus {
    pub fn from_grade(grade: Option<f64>) -> Self {
        match grade {
            None => GradeStatus::Pending,
            Some(g) if g >= PASS_THRESHOLD => GradeStatus::Passed,
            Some(_) => GradeStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeStatus::Pending => "pending",
            GradeStatus::Passed => "passed",
            GradeStatus::Failed => "failed",
        }
    }
}

/// `None` while the exam has not been graded.
pub fn is_passed(grade: Option<f64>) -> Option<bool> {
    grade.map(|g| g >= PASS_THRESHOLD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamTiming {
    Past,
    Today,
    /// Within the next seven days.
    Soon,
    Upcoming,
}

impl ExamTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamTiming::Past => "past",
            ExamTiming::Today => "today",
            ExamTiming::Soon => "soon",
            ExamTiming::Upcoming => "upcoming",
        }
    }
}

/// Parses either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'")))
}

//=========================================================================================
// Accounts
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_cycles_restore_status() {
        for start in [
            TopicStatus::NotStarted,
            TopicStatus::InProgress,
            TopicStatus::Completed,
        ] {
            assert_eq!(start.next().next().next(), start);
        }
    }

    #[test]
    fn unknown_raw_status_cycles_to_not_started() {
        assert_eq!(TopicStatus::cycle_raw("archived"), TopicStatus::NotStarted);
        assert_eq!(TopicStatus::cycle_raw("in_progress"), TopicStatus::Completed);
    }

    #[test]
    fn grade_status_threshold() {
        assert_eq!(GradeStatus::from_grade(None), GradeStatus::Pending);
        assert_eq!(GradeStatus::from_grade(Some(4.9)), GradeStatus::Failed);
        assert_eq!(GradeStatus::from_grade(Some(5.0)), GradeStatus::Passed);
        assert_eq!(is_passed(None), None);
        assert_eq!(is_passed(Some(7.5)), Some(true));
    }

    #[test]
    fn labels_match_serialized_names() {
        for status in [GradeStatus::Pending, GradeStatus::Passed, GradeStatus::Failed] {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
        for timing in [
            ExamTiming::Past,
            ExamTiming::Today,
            ExamTiming::Soon,
            ExamTiming::Upcoming,
        ] {
            assert_eq!(serde_json::to_value(timing).unwrap(), timing.as_str());
        }
    }

    #[test]
    fn exam_timing_buckets() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let exam_on = |day: u32| Exam {
            id: "e".into(),
            unit: "UT1".into(),
            topics: "Variables".into(),
            exam_date: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            grade: None,
            created_at: Utc::now(),
        };
        assert_eq!(exam_on(9).timing(today), ExamTiming::Past);
        assert_eq!(exam_on(10).timing(today), ExamTiming::Today);
        assert_eq!(exam_on(17).timing(today), ExamTiming::Soon);
        assert_eq!(exam_on(18).timing(today), ExamTiming::Upcoming);
    }

    #[test]
    fn parse_date_accepts_both_formats() {
        let full = parse_date("2024-06-01T10:30:00.000Z").unwrap();
        assert_eq!(full, Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap());
        let bare = parse_date("2024-06-01").unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert!(parse_date("June 1st").is_none());
    }

    #[test]
    fn topic_without_children_omits_sub_topics_key() {
        let topic = Topic {
            id: "topic-1".into(),
            number: 1,
            title: "Variables".into(),
            status: TopicStatus::NotStarted,
            sub_topics: Vec::new(),
        };
        let json = serde_json::to_value(&topic).unwrap();
        assert!(json.get("subTopics").is_none());
        assert_eq!(json["status"], "not_started");
    }

    #[test]
    fn snippet_draft_reports_first_missing_field() {
        let draft = SnippetDraft {
            topic_id: "t1".into(),
            title: "X".into(),
            code: "  ".into(),
            description: None,
        };
        assert_eq!(draft.missing_field(), Some("code"));
    }
}
