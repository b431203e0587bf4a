//! services/api/src/adapters/local.rs
//!
//! A file-backed `StudyStore` for running without a database. Each user's data
//! is kept as three JSON arrays under fixed keys inside a per-user directory:
//! the topic tree, the snippets and the exams. Exam dates are written as
//! strings and turned back into timestamps explicitly when read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use study_tracker_core::domain::{parse_date, CodeSnippet, Exam, Identity, Topic, TopicRow, TopicStatus};
use study_tracker_core::ports::{PortError, PortResult, StudyStore};
use study_tracker_core::tree::{build_topic_tree, flatten_topic_tree};
use tokio::sync::Mutex;
use tracing::info;

pub const TOPICS_KEY: &str = "java-topics";
pub const SNIPPETS_KEY: &str = "code-snippets";
pub const EXAMS_KEY: &str = "java-exams";

//=========================================================================================
// Stored Shapes
//=========================================================================================

/// An exam as written to disk, with its dates as strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExam {
    pub id: String,
    pub unit: String,
    pub topics: String,
    pub exam_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    pub created_at: String,
}

impl From<&Exam> for StoredExam {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id.clone(),
            unit: exam.unit.clone(),
            topics: exam.topics.clone(),
            exam_date: exam.exam_date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            grade: exam.grade,
            created_at: exam.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl StoredExam {
    /// Turns the stored date strings back into timestamps.
    pub fn rehydrate(self) -> PortResult<Exam> {
        let exam_date = parse_date(&self.exam_date).ok_or_else(|| {
            PortError::Unexpected(format!("Exam {} has an invalid examDate '{}'", self.id, self.exam_date))
        })?;
        let created_at = parse_date(&self.created_at).ok_or_else(|| {
            PortError::Unexpected(format!("Exam {} has an invalid createdAt '{}'", self.id, self.created_at))
        })?;
        Ok(Exam {
            id: self.id,
            unit: self.unit,
            topics: self.topics,
            exam_date,
            grade: self.grade,
            created_at,
        })
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct LocalStore {
    root: PathBuf,
    // Serialises read-modify-write cycles on the files.
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using local study data at {}", root.display());
        Self {
            root,
            lock: Mutex::new(()),
        }
    }

    fn path(&self, owner: Identity, key: &str) -> PathBuf {
        self.root.join(owner.to_string()).join(format!("{key}.json"))
    }

    async fn read<T: DeserializeOwned>(&self, owner: Identity, key: &str) -> PortResult<Vec<T>> {
        let path = self.path(owner, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PortError::Unexpected(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PortError::Unexpected(format!("{}: {}", path.display(), e))),
        }
    }

    async fn write<T: Serialize>(&self, owner: Identity, key: &str, items: &[T]) -> PortResult<()> {
        let path = self.path(owner, key);
        let json = serde_json::to_vec_pretty(items).map_err(|e| PortError::Unexpected(e.to_string()))?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| PortError::Unexpected(format!("{}: {}", path.display(), e)))
    }

    async fn read_topics(&self, owner: Identity) -> PortResult<Vec<Topic>> {
        let mut topics: Vec<Topic> = self.read(owner, TOPICS_KEY).await?;
        topics.sort_by_key(|t| t.number);
        Ok(topics)
    }

    async fn read_snippets(&self, owner: Identity) -> PortResult<Vec<CodeSnippet>> {
        self.read(owner, SNIPPETS_KEY).await
    }

    async fn read_exams(&self, owner: Identity) -> PortResult<Vec<Exam>> {
        let stored: Vec<StoredExam> = self.read(owner, EXAMS_KEY).await?;
        stored.into_iter().map(StoredExam::rehydrate).collect()
    }

    async fn write_exams(&self, owner: Identity, exams: &[Exam]) -> PortResult<()> {
        let stored: Vec<StoredExam> = exams.iter().map(StoredExam::from).collect();
        self.write(owner, EXAMS_KEY, &stored).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

//=========================================================================================
// `StudyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyStore for LocalStore {
    async fn select_topics(&self, owner: Identity) -> PortResult<Vec<TopicRow>> {
        let _guard = self.lock.lock().await;
        Ok(flatten_topic_tree(&self.read_topics(owner).await?))
    }

    async fn insert_topics(&self, owner: Identity, rows: &[TopicRow]) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = flatten_topic_tree(&self.read_topics(owner).await?);
        all.extend_from_slice(rows);
        self.write(owner, TOPICS_KEY, &build_topic_tree(&all)).await
    }

    async fn update_topic_status(
        &self,
        owner: Identity,
        topic_id: &str,
        status: TopicStatus,
    ) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut topics = self.read_topics(owner).await?;
        let mut found = false;
        for topic in &mut topics {
            if topic.id == topic_id {
                topic.status = status;
                found = true;
            }
            for sub in &mut topic.sub_topics {
                if sub.id == topic_id {
                    sub.status = status;
                    found = true;
                }
            }
        }
        if !found {
            return Err(PortError::NotFound(format!("Topic {} not found", topic_id)));
        }
        self.write(owner, TOPICS_KEY, &topics).await
    }

    async fn select_snippets(&self, owner: Identity) -> PortResult<Vec<CodeSnippet>> {
        let _guard = self.lock.lock().await;
        let mut snippets = self.read_snippets(owner).await?;
        snippets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snippets)
    }

    async fn insert_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut snippets = self.read_snippets(owner).await?;
        snippets.push(snippet.clone());
        self.write(owner, SNIPPETS_KEY, &snippets).await
    }

    async fn update_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut snippets = self.read_snippets(owner).await?;
        let slot = snippets
            .iter_mut()
            .find(|s| s.id == snippet.id)
            .ok_or_else(|| PortError::NotFound(format!("Snippet {} not found", snippet.id)))?;
        *slot = snippet.clone();
        self.write(owner, SNIPPETS_KEY, &snippets).await
    }

    async fn delete_snippet(&self, owner: Identity, snippet_id: &str) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut snippets = self.read_snippets(owner).await?;
        snippets.retain(|s| s.id != snippet_id);
        self.write(owner, SNIPPETS_KEY, &snippets).await
    }

    async fn select_exams(&self, owner: Identity) -> PortResult<Vec<Exam>> {
        let _guard = self.lock.lock().await;
        let mut exams = self.read_exams(owner).await?;
        exams.sort_by(|a, b| b.exam_date.cmp(&a.exam_date));
        Ok(exams)
    }

    async fn insert_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut exams = self.read_exams(owner).await?;
        exams.push(exam.clone());
        self.write_exams(owner, &exams).await
    }

    async fn update_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut exams = self.read_exams(owner).await?;
        let slot = exams
            .iter_mut()
            .find(|e| e.id == exam.id)
            .ok_or_else(|| PortError::NotFound(format!("Exam {} not found", exam.id)))?;
        *slot = exam.clone();
        self.write_exams(owner, &exams).await
    }

    async fn delete_exam(&self, owner: Identity, exam_id: &str) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut exams = self.read_exams(owner).await?;
        exams.retain(|e| e.id != exam_id);
        self.write_exams(owner, &exams).await
    }
}
