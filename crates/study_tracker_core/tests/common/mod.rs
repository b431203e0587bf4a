//! In-memory `StudyStore` with failure injection and call recording.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use study_tracker_core::{
    CodeSnippet, DataCache, Exam, Identity, PortError, PortResult, SnippetDraft, StudyStore,
    TopicRow, TopicStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SelectTopics,
    InsertTopics,
    UpdateTopic,
    SelectSnippets,
    InsertSnippet,
    UpdateSnippet,
    DeleteSnippet,
    SelectExams,
    InsertExam,
    UpdateExam,
    DeleteExam,
}

#[derive(Default)]
struct Tables {
    topics: HashMap<Identity, Vec<TopicRow>>,
    snippets: HashMap<Identity, Vec<CodeSnippet>>,
    exams: HashMap<Identity, Vec<Exam>>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<Op>>,
    held: Mutex<HashSet<Op>>,
    gate: Semaphore,
    calls: Mutex<Vec<(Op, Identity)>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            failing: Mutex::new(HashSet::new()),
            held: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every later call of `op` fail.
    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Makes later calls of `op` wait until `release` hands out a permit.
    pub fn hold(&self, op: Op) {
        self.held.lock().unwrap().insert(op);
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn calls(&self) -> Vec<(Op, Identity)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|(o, _)| *o == op).count()
    }

    pub fn put_topics(&self, owner: Identity, rows: Vec<TopicRow>) {
        self.tables.lock().unwrap().topics.insert(owner, rows);
    }

    pub fn topic_rows(&self, owner: Identity) -> Vec<TopicRow> {
        self.tables
            .lock()
            .unwrap()
            .topics
            .get(&owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn snippet_rows(&self, owner: Identity) -> Vec<CodeSnippet> {
        self.tables
            .lock()
            .unwrap()
            .snippets
            .get(&owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_exams(&self, owner: Identity, exams: Vec<Exam>) {
        self.tables.lock().unwrap().exams.insert(owner, exams);
    }

    async fn enter(&self, op: Op, owner: Identity) -> PortResult<()> {
        self.calls.lock().unwrap().push((op, owner));
        let held = self.held.lock().unwrap().contains(&op);
        if held {
            self.gate
                .acquire()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .forget();
        }
        if self.failing.lock().unwrap().contains(&op) {
            return Err(PortError::Unexpected(format!("{op:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl StudyStore for MemoryStore {
    async fn select_topics(&self, owner: Identity) -> PortResult<Vec<TopicRow>> {
        self.enter(Op::SelectTopics, owner).await?;
        Ok(self.topic_rows(owner))
    }

    async fn insert_topics(&self, owner: Identity, rows: &[TopicRow]) -> PortResult<()> {
        self.enter(Op::InsertTopics, owner).await?;
        self.tables
            .lock()
            .unwrap()
            .topics
            .entry(owner)
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    async fn update_topic_status(
        &self,
        owner: Identity,
        topic_id: &str,
        status: TopicStatus,
    ) -> PortResult<()> {
        self.enter(Op::UpdateTopic, owner).await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .topics
            .get_mut(&owner)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == topic_id))
            .ok_or_else(|| PortError::NotFound(topic_id.to_string()))?;
        row.status = status;
        Ok(())
    }

    async fn select_snippets(&self, owner: Identity) -> PortResult<Vec<CodeSnippet>> {
        self.enter(Op::SelectSnippets, owner).await?;
        let mut rows = self.snippet_rows(owner);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        self.enter(Op::InsertSnippet, owner).await?;
        self.tables
            .lock()
            .unwrap()
            .snippets
            .entry(owner)
            .or_default()
            .push(snippet.clone());
        Ok(())
    }

    async fn update_snippet(&self, owner: Identity, snippet: &CodeSnippet) -> PortResult<()> {
        self.enter(Op::UpdateSnippet, owner).await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .snippets
            .get_mut(&owner)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == snippet.id))
            .ok_or_else(|| PortError::NotFound(snippet.id.clone()))?;
        *row = snippet.clone();
        Ok(())
    }

    async fn delete_snippet(&self, owner: Identity, snippet_id: &str) -> PortResult<()> {
        self.enter(Op::DeleteSnippet, owner).await?;
        if let Some(rows) = self.tables.lock().unwrap().snippets.get_mut(&owner) {
            rows.retain(|r| r.id != snippet_id);
        }
        Ok(())
    }

    async fn select_exams(&self, owner: Identity) -> PortResult<Vec<Exam>> {
        self.enter(Op::SelectExams, owner).await?;
        let mut rows = self
            .tables
            .lock()
            .unwrap()
            .exams
            .get(&owner)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| b.exam_date.cmp(&a.exam_date));
        Ok(rows)
    }

    async fn insert_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        self.enter(Op::InsertExam, owner).await?;
        self.tables
            .lock()
            .unwrap()
            .exams
            .entry(owner)
            .or_default()
            .push(exam.clone());
        Ok(())
    }

    async fn update_exam(&self, owner: Identity, exam: &Exam) -> PortResult<()> {
        self.enter(Op::UpdateExam, owner).await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .exams
            .get_mut(&owner)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == exam.id))
            .ok_or_else(|| PortError::NotFound(exam.id.clone()))?;
        *row = exam.clone();
        Ok(())
    }

    async fn delete_exam(&self, owner: Identity, exam_id: &str) -> PortResult<()> {
        self.enter(Op::DeleteExam, owner).await?;
        if let Some(rows) = self.tables.lock().unwrap().exams.get_mut(&owner) {
            rows.retain(|r| r.id != exam_id);
        }
        Ok(())
    }
}

pub fn cache_over(store: &Arc<MemoryStore>) -> DataCache {
    DataCache::new(store.clone())
}

pub fn draft(topic_id: &str, title: &str, code: &str) -> SnippetDraft {
    SnippetDraft {
        topic_id: topic_id.to_string(),
        title: title.to_string(),
        code: code.to_string(),
        description: None,
    }
}

pub fn exam(id: &str, unit: &str, day: u32, grade: Option<f64>) -> Exam {
    Exam {
        id: id.to_string(),
        unit: unit.to_string(),
        topics: "Bucles, Funciones".to_string(),
        exam_date: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
        grade,
        created_at: Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
    }
}

pub fn user() -> Identity {
    Uuid::new_v4()
}
