//! File-backed store behaviour against a temporary directory.

use std::sync::Arc;

use api_lib::adapters::local::{LocalStore, EXAMS_KEY, TOPICS_KEY};
use chrono::{TimeZone, Utc};
use study_tracker_core::curriculum::default_topics;
use study_tracker_core::domain::{CodeSnippet, Exam, TopicStatus};
use study_tracker_core::ports::{PortError, StudyStore};
use study_tracker_core::tree::flatten_topic_tree;
use study_tracker_core::{DataCache, SessionEvent};
use tempfile::TempDir;
use uuid::Uuid;

fn exam(id: &str, day: u32, grade: Option<f64>) -> Exam {
    Exam {
        id: id.to_string(),
        unit: "UT2".to_string(),
        topics: "Condicionales".to_string(),
        exam_date: Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap(),
        grade,
        created_at: Utc::now(),
    }
}

fn snippet(id: &str) -> CodeSnippet {
    CodeSnippet {
        id: id.to_string(),
        topic_id: "topic-2-1".to_string(),
        title: "if".to_string(),
        code: "if (x > 0) {}".to_string(),
        description: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn exams_come_back_with_real_dates() {
    let dir = TempDir::new().unwrap();
    let owner = Uuid::new_v4();
    let written = exam("e1", 14, Some(6.5));

    LocalStore::new(dir.path())
        .insert_exam(owner, &written)
        .await
        .unwrap();

    // Dates are strings on disk.
    let raw = std::fs::read_to_string(
        dir.path()
            .join(owner.to_string())
            .join(format!("{EXAMS_KEY}.json")),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[0]["examDate"], "2024-05-14T09:30:00Z");

    // A fresh store reads them back as timestamps.
    let read = LocalStore::new(dir.path()).select_exams(owner).await.unwrap();
    assert_eq!(read, vec![written]);
}

#[tokio::test]
async fn plain_date_strings_are_rehydrated() {
    let dir = TempDir::new().unwrap();
    let owner = Uuid::new_v4();
    let user_dir = dir.path().join(owner.to_string());
    std::fs::create_dir_all(&user_dir).unwrap();
    std::fs::write(
        user_dir.join(format!("{EXAMS_KEY}.json")),
        r#"[{"id":"e1","unit":"UT1","topics":"Variables","examDate":"2024-03-01","createdAt":"2024-02-01T10:00:00.000Z"}]"#,
    )
    .unwrap();

    let exams = LocalStore::new(dir.path()).select_exams(owner).await.unwrap();
    assert_eq!(exams[0].exam_date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    assert_eq!(exams[0].grade, None);
}

#[tokio::test]
async fn a_bad_date_is_an_error() {
    let dir = TempDir::new().unwrap();
    let owner = Uuid::new_v4();
    let user_dir = dir.path().join(owner.to_string());
    std::fs::create_dir_all(&user_dir).unwrap();
    std::fs::write(
        user_dir.join(format!("{EXAMS_KEY}.json")),
        r#"[{"id":"e1","unit":"UT1","topics":"x","examDate":"soon","createdAt":"2024-02-01"}]"#,
    )
    .unwrap();

    let err = LocalStore::new(dir.path()).select_exams(owner).await.unwrap_err();
    assert!(matches!(err, PortError::Unexpected(msg) if msg.contains("examDate")));
}

#[tokio::test]
async fn missing_files_read_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path());
    let owner = Uuid::new_v4();

    assert!(store.select_topics(owner).await.unwrap().is_empty());
    assert!(store.select_snippets(owner).await.unwrap().is_empty());
    assert!(store.select_exams(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn topics_are_stored_as_a_tree() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path());
    let owner = Uuid::new_v4();
    let rows = flatten_topic_tree(&default_topics());

    store.insert_topics(owner, &rows).await.unwrap();
    store
        .update_topic_status(owner, "topic-2-3", TopicStatus::Completed)
        .await
        .unwrap();

    let raw = std::fs::read_to_string(
        dir.path()
            .join(owner.to_string())
            .join(format!("{TOPICS_KEY}.json")),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 10);
    assert_eq!(json[1]["subTopics"][2]["status"], "completed");

    let read = store.select_topics(owner).await.unwrap();
    assert_eq!(read.len(), rows.len());
    let changed = read.iter().find(|r| r.id == "topic-2-3").unwrap();
    assert_eq!(changed.status, TopicStatus::Completed);
    assert_eq!(changed.parent_id.as_deref(), Some("topic-2"));
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path());
    let owner = Uuid::new_v4();

    let err = store
        .update_topic_status(owner, "topic-99", TopicStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));

    let err = store.update_snippet(owner, &snippet("s1")).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));

    let err = store.update_exam(owner, &exam("e1", 2, None)).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn users_do_not_share_files() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path());
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    store.insert_snippet(alice, &snippet("s1")).await.unwrap();

    assert_eq!(store.select_snippets(alice).await.unwrap().len(), 1);
    assert!(store.select_snippets(bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn snippet_update_and_delete() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path());
    let owner = Uuid::new_v4();
    let mut s = snippet("s1");
    store.insert_snippet(owner, &s).await.unwrap();
    store.insert_snippet(owner, &snippet("s2")).await.unwrap();

    s.title = "nested if".to_string();
    store.update_snippet(owner, &s).await.unwrap();
    store.delete_snippet(owner, "s2").await.unwrap();

    let read = store.select_snippets(owner).await.unwrap();
    assert_eq!(read, vec![s]);
}

#[tokio::test]
async fn cache_seeds_once_over_local_files() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn StudyStore> = Arc::new(LocalStore::new(dir.path()));
    let owner = Uuid::new_v4();

    let first = DataCache::new(store.clone());
    let report = first.handle(SessionEvent::Became(owner)).await;
    assert!(report.is_ok());
    assert!(report.seeded);
    first.cycle_sub_topic_status("topic-3", "topic-3-1").await.unwrap();

    let second = DataCache::new(store);
    let report = second.handle(SessionEvent::Became(owner)).await;
    assert!(!report.seeded);
    let topics = second.topics();
    assert_eq!(topics.len(), 10);
    assert_eq!(
        topics[2].sub_topic("topic-3-1").map(|s| s.status),
        Some(TopicStatus::InProgress)
    );
}
