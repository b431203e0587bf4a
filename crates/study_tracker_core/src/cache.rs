//! crates/study_tracker_core/src/cache.rs
//!
//! The in-memory mirror of a user's topics, snippets and exams.
//!
//! Each collection lives in its own observable slot holding an `Arc<Vec<T>>`.
//! Writers never touch a published vector: every change builds a new one and
//! swaps it in, so snapshots handed to readers stay valid. Local state only
//! changes after the store has confirmed the matching remote write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::curriculum::default_topics;
use crate::domain::{
    CodeSnippet, Exam, ExamDraft, Identity, SnippetDraft, SubTopic, Topic, TopicStatus,
};
use crate::ports::{PortError, StudyStore};
use crate::session::{SessionEvent, SessionStore};
use crate::tree::{build_topic_tree, flatten_topic_tree};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// A required field was empty; nothing was sent to the store.
    #[error("Missing or invalid field: {0}")]
    Validation(String),
    #[error("Remote store error: {0}")]
    Remote(#[from] PortError),
    #[error("No authenticated user")]
    NotAuthenticated,
    #[error("Not found: {0}")]
    NotFound(String),
    /// A change to the same entity has not come back from the store yet.
    #[error("A change to {0} is already in progress")]
    Busy(String),
}

/// Outcome of loading the three collections for a new identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub topics: Option<CacheError>,
    pub snippets: Option<CacheError>,
    pub exams: Option<CacheError>,
    /// The default curriculum was written because the user had no topics.
    pub seeded: bool,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.topics.is_none() && self.snippets.is_none() && self.exams.is_none()
    }
}

//=========================================================================================
// Slots
//=========================================================================================

/// One observable collection.
pub struct Slot<T> {
    tx: watch::Sender<Arc<Vec<T>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.tx.subscribe()
    }

    fn replace(&self, items: Vec<T>) {
        self.tx.send_replace(Arc::new(items));
    }

    /// Builds the next value from the current one and publishes it whole.
    fn apply(&self, next: impl FnOnce(&[T]) -> Vec<T>) {
        self.tx.send_modify(|current| *current = Arc::new(next(current)));
    }
}

//=========================================================================================
// Single-flight guard
//=========================================================================================

#[derive(Default)]
struct InFlight {
    keys: Mutex<HashSet<String>>,
}

impl InFlight {
    fn claim(&self, key: String) -> Result<InFlightGuard<'_>, CacheError> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.clone()) {
            return Err(CacheError::Busy(key));
        }
        Ok(InFlightGuard { owner: self, key })
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

//=========================================================================================
// The Cache
//=========================================================================================

#[derive(Default)]
struct Active {
    identity: Option<Identity>,
    /// Bumped on every session transition. Work started under an older epoch
    /// does not publish.
    epoch: u64,
}

pub struct DataCache {
    store: Arc<dyn StudyStore>,
    active: AsyncMutex<Active>,
    topics: Slot<Topic>,
    snippets: Slot<CodeSnippet>,
    exams: Slot<Exam>,
    in_flight: InFlight,
}

impl DataCache {
    /// Creates an empty cache with no active identity.
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self {
            store,
            active: AsyncMutex::new(Active::default()),
            topics: Slot::new(),
            snippets: Slot::new(),
            exams: Slot::new(),
            in_flight: InFlight::default(),
        }
    }

    // --- Read side ---

    pub fn topics(&self) -> Arc<Vec<Topic>> {
        self.topics.snapshot()
    }

    pub fn snippets(&self) -> Arc<Vec<CodeSnippet>> {
        self.snippets.snapshot()
    }

    pub fn exams(&self) -> Arc<Vec<Exam>> {
        self.exams.snapshot()
    }

    pub fn subscribe_topics(&self) -> watch::Receiver<Arc<Vec<Topic>>> {
        self.topics.subscribe()
    }

    pub fn subscribe_snippets(&self) -> watch::Receiver<Arc<Vec<CodeSnippet>>> {
        self.snippets.subscribe()
    }

    pub fn subscribe_exams(&self) -> watch::Receiver<Arc<Vec<Exam>>> {
        self.exams.subscribe()
    }

    pub fn snippets_for_topic(&self, topic_id: &str) -> Vec<CodeSnippet> {
        self.snippets
            .snapshot()
            .iter()
            .filter(|s| s.topic_id == topic_id)
            .cloned()
            .collect()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.active.lock().await.identity
    }

    // --- Session handling ---

    /// Applies a session transition.
    ///
    /// `Cleared` empties every slot before returning. `Became` for a new
    /// identity empties them, then loads the three collections concurrently;
    /// each slot publishes as soon as its own fetch resolves. `Became` for the
    /// identity already active is a reload: slots keep their values until
    /// their fetch succeeds.
    pub async fn handle(&self, event: SessionEvent) -> LoadReport {
        match event {
            SessionEvent::Cleared => {
                let mut active = self.active.lock().await;
                active.identity = None;
                active.epoch += 1;
                self.clear_slots();
                LoadReport::default()
            }
            SessionEvent::Became(identity) => {
                let epoch = {
                    let mut active = self.active.lock().await;
                    // A reload for the same user keeps its snapshots and epoch, so
                    // a failed fetch leaves its slot alone and in-flight mutations
                    // still publish.
                    if active.identity != Some(identity) {
                        active.identity = Some(identity);
                        active.epoch += 1;
                        self.clear_slots();
                    }
                    active.epoch
                };
                info!("Loading study data for {}", identity);

                let (topics, snippets, exams) = tokio::join!(
                    self.load_topics(identity, epoch),
                    self.load_snippets(identity, epoch),
                    self.load_exams(identity, epoch),
                );
                LoadReport {
                    seeded: matches!(topics, Ok(true)),
                    topics: topics.err(),
                    snippets: snippets.err(),
                    exams: exams.err(),
                }
            }
        }
    }

    /// Reloads everything for the current identity.
    pub async fn reload(&self) -> Result<LoadReport, CacheError> {
        let identity = self.identity().await.ok_or(CacheError::NotAuthenticated)?;
        Ok(self.handle(SessionEvent::Became(identity)).await)
    }

    /// Drives the cache from a session store until the store is dropped.
    pub async fn follow(&self, session: &SessionStore) {
        let mut events = session.events();
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle(event).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} session events, resyncing", missed);
                    let event = match session.identity() {
                        Some(id) => SessionEvent::Became(id),
                        None => SessionEvent::Cleared,
                    };
                    self.handle(event).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn clear_slots(&self) {
        self.topics.replace(Vec::new());
        self.snippets.replace(Vec::new());
        self.exams.replace(Vec::new());
    }

    async fn load_topics(&self, owner: Identity, epoch: u64) -> Result<bool, CacheError> {
        let rows = self.store.select_topics(owner).await.map_err(|e| {
            error!("Failed to load topics for {}: {}", owner, e);
            CacheError::Remote(e)
        })?;

        if !rows.is_empty() {
            let tree = build_topic_tree(&rows);
            self.publish(epoch, || self.topics.replace(tree)).await;
            return Ok(false);
        }

        let defaults = default_topics();
        self.store
            .insert_topics(owner, &flatten_topic_tree(&defaults))
            .await
            .map_err(|e| {
                error!("Failed to seed default topics for {}: {}", owner, e);
                CacheError::Remote(e)
            })?;
        info!("Seeded default curriculum for {}", owner);
        self.publish(epoch, || self.topics.replace(defaults)).await;
        Ok(true)
    }

    async fn load_snippets(&self, owner: Identity, epoch: u64) -> Result<(), CacheError> {
        let snippets = self.store.select_snippets(owner).await.map_err(|e| {
            error!("Failed to load snippets for {}: {}", owner, e);
            CacheError::Remote(e)
        })?;
        self.publish(epoch, || self.snippets.replace(snippets)).await;
        Ok(())
    }

    async fn load_exams(&self, owner: Identity, epoch: u64) -> Result<(), CacheError> {
        let exams = self.store.select_exams(owner).await.map_err(|e| {
            error!("Failed to load exams for {}: {}", owner, e);
            CacheError::Remote(e)
        })?;
        self.publish(epoch, || self.exams.replace(exams)).await;
        Ok(())
    }

    /// Runs `apply` only if no session transition happened since `epoch`.
    async fn publish(&self, epoch: u64, apply: impl FnOnce()) -> bool {
        let active = self.active.lock().await;
        if active.epoch != epoch {
            debug!("Discarding result from a previous session");
            return false;
        }
        apply();
        true
    }

    async fn ticket(&self) -> Result<(Identity, u64), CacheError> {
        let active = self.active.lock().await;
        let identity = active.identity.ok_or(CacheError::NotAuthenticated)?;
        Ok((identity, active.epoch))
    }

    // --- Topics ---

    /// Advances a root topic to its next status and returns it.
    pub async fn cycle_topic_status(&self, topic_id: &str) -> Result<TopicStatus, CacheError> {
        let current = self
            .topics()
            .iter()
            .find(|t| t.id == topic_id)
            .map(|t| t.status)
            .ok_or_else(|| CacheError::NotFound(format!("topic {topic_id}")))?;
        let next = current.next();
        self.update_topic_status(topic_id, next).await?;
        Ok(next)
    }

    pub async fn update_topic_status(
        &self,
        topic_id: &str,
        status: TopicStatus,
    ) -> Result<(), CacheError> {
        let (owner, epoch) = self.ticket().await?;
        if !self.topics().iter().any(|t| t.id == topic_id) {
            return Err(CacheError::NotFound(format!("topic {topic_id}")));
        }
        let _guard = self.in_flight.claim(format!("topic:{topic_id}"))?;

        self.store
            .update_topic_status(owner, topic_id, status)
            .await
            .map_err(|e| {
                error!("Failed to update topic {}: {}", topic_id, e);
                CacheError::Remote(e)
            })?;

        self.publish(epoch, || {
            self.topics.apply(|topics| {
                topics
                    .iter()
                    .map(|t| {
                        if t.id == topic_id {
                            Topic { status, ..t.clone() }
                        } else {
                            t.clone()
                        }
                    })
                    .collect()
            })
        })
        .await;
        Ok(())
    }

    /// Advances one subtopic, addressed by its parent, and returns its new status.
    pub async fn cycle_sub_topic_status(
        &self,
        topic_id: &str,
        sub_topic_id: &str,
    ) -> Result<TopicStatus, CacheError> {
        let current = self
            .topics()
            .iter()
            .find(|t| t.id == topic_id)
            .and_then(|t| t.sub_topic(sub_topic_id))
            .map(|s| s.status)
            .ok_or_else(|| CacheError::NotFound(format!("subtopic {topic_id}/{sub_topic_id}")))?;
        let next = current.next();
        self.update_sub_topic_status(topic_id, sub_topic_id, next)
            .await?;
        Ok(next)
    }

    pub async fn update_sub_topic_status(
        &self,
        topic_id: &str,
        sub_topic_id: &str,
        status: TopicStatus,
    ) -> Result<(), CacheError> {
        let (owner, epoch) = self.ticket().await?;
        let known = self
            .topics()
            .iter()
            .any(|t| t.id == topic_id && t.sub_topic(sub_topic_id).is_some());
        if !known {
            return Err(CacheError::NotFound(format!(
                "subtopic {topic_id}/{sub_topic_id}"
            )));
        }
        let _guard = self.in_flight.claim(format!("topic:{sub_topic_id}"))?;

        self.store
            .update_topic_status(owner, sub_topic_id, status)
            .await
            .map_err(|e| {
                error!("Failed to update subtopic {}: {}", sub_topic_id, e);
                CacheError::Remote(e)
            })?;

        self.publish(epoch, || {
            self.topics.apply(|topics| {
                topics
                    .iter()
                    .map(|t| {
                        if t.id != topic_id {
                            return t.clone();
                        }
                        let sub_topics = t
                            .sub_topics
                            .iter()
                            .map(|s| {
                                if s.id == sub_topic_id {
                                    SubTopic { status, ..s.clone() }
                                } else {
                                    s.clone()
                                }
                            })
                            .collect();
                        Topic {
                            sub_topics,
                            ..t.clone()
                        }
                    })
                    .collect()
            })
        })
        .await;
        Ok(())
    }

    // --- Code Snippets ---

    /// Stores a new snippet with a fresh id and the current time.
    pub async fn add_snippet(&self, draft: SnippetDraft) -> Result<CodeSnippet, CacheError> {
        if let Some(field) = draft.missing_field() {
            return Err(CacheError::Validation(field.to_string()));
        }
        let (owner, epoch) = self.ticket().await?;
        let snippet = draft.into_snippet(Uuid::new_v4().to_string(), Utc::now());

        self.store
            .insert_snippet(owner, &snippet)
            .await
            .map_err(|e| {
                error!("Failed to insert snippet: {}", e);
                CacheError::Remote(e)
            })?;

        self.publish(epoch, || {
            self.snippets.apply(|snippets| {
                std::iter::once(snippet.clone())
                    .chain(snippets.iter().cloned())
                    .collect()
            })
        })
        .await;
        Ok(snippet)
    }

    /// Replaces the content of an existing snippet, keeping its id and creation time.
    pub async fn update_snippet(
        &self,
        snippet_id: &str,
        draft: SnippetDraft,
    ) -> Result<CodeSnippet, CacheError> {
        if let Some(field) = draft.missing_field() {
            return Err(CacheError::Validation(field.to_string()));
        }
        let (owner, epoch) = self.ticket().await?;
        let created_at = self
            .snippets()
            .iter()
            .find(|s| s.id == snippet_id)
            .map(|s| s.created_at)
            .ok_or_else(|| CacheError::NotFound(format!("snippet {snippet_id}")))?;
        let _guard = self.in_flight.claim(format!("snippet:{snippet_id}"))?;
        let snippet = draft.into_snippet(snippet_id.to_string(), created_at);

        self.store
            .update_snippet(owner, &snippet)
            .await
            .map_err(|e| {
                error!("Failed to update snippet {}: {}", snippet_id, e);
                CacheError::Remote(e)
            })?;

        self.publish(epoch, || {
            self.snippets.apply(|snippets| {
                snippets
                    .iter()
                    .map(|s| if s.id == snippet_id { snippet.clone() } else { s.clone() })
                    .collect()
            })
        })
        .await;
        Ok(snippet)
    }

    pub async fn delete_snippet(&self, snippet_id: &str) -> Result<(), CacheError> {
        let (owner, epoch) = self.ticket().await?;
        let _guard = self.in_flight.claim(format!("snippet:{snippet_id}"))?;

        self.store
            .delete_snippet(owner, snippet_id)
            .await
            .map_err(|e| {
                error!("Failed to delete snippet {}: {}", snippet_id, e);
                CacheError::Remote(e)
            })?;

        self.publish(epoch, || {
            self.snippets.apply(|snippets| {
                snippets.iter().filter(|s| s.id != snippet_id).cloned().collect()
            })
        })
        .await;
        Ok(())
    }

    // --- Exams ---

    pub async fn add_exam(&self, draft: ExamDraft) -> Result<Exam, CacheError> {
        if let Some(field) = draft.missing_field() {
            return Err(CacheError::Validation(field.to_string()));
        }
        let (owner, epoch) = self.ticket().await?;
        let exam = draft.into_exam(Uuid::new_v4().to_string(), Utc::now());

        self.store.insert_exam(owner, &exam).await.map_err(|e| {
            error!("Failed to insert exam: {}", e);
            CacheError::Remote(e)
        })?;

        self.publish(epoch, || {
            self.exams.apply(|exams| {
                let mut next = exams.to_vec();
                next.push(exam.clone());
                sort_exams(&mut next);
                next
            })
        })
        .await;
        Ok(exam)
    }

    /// Replaces an existing exam's fields, keeping its id and creation time.
    pub async fn update_exam(&self, exam_id: &str, draft: ExamDraft) -> Result<Exam, CacheError> {
        if let Some(field) = draft.missing_field() {
            return Err(CacheError::Validation(field.to_string()));
        }
        let (owner, epoch) = self.ticket().await?;
        let created_at = self
            .exams()
            .iter()
            .find(|e| e.id == exam_id)
            .map(|e| e.created_at)
            .ok_or_else(|| CacheError::NotFound(format!("exam {exam_id}")))?;
        let _guard = self.in_flight.claim(format!("exam:{exam_id}"))?;
        let exam = draft.into_exam(exam_id.to_string(), created_at);

        self.store.update_exam(owner, &exam).await.map_err(|e| {
            error!("Failed to update exam {}: {}", exam_id, e);
            CacheError::Remote(e)
        })?;

        self.publish(epoch, || {
            self.exams.apply(|exams| {
                let mut next: Vec<Exam> = exams
                    .iter()
                    .map(|e| if e.id == exam_id { exam.clone() } else { e.clone() })
                    .collect();
                sort_exams(&mut next);
                next
            })
        })
        .await;
        Ok(exam)
    }

    pub async fn delete_exam(&self, exam_id: &str) -> Result<(), CacheError> {
        let (owner, epoch) = self.ticket().await?;
        let _guard = self.in_flight.claim(format!("exam:{exam_id}"))?;

        self.store.delete_exam(owner, exam_id).await.map_err(|e| {
            error!("Failed to delete exam {}: {}", exam_id, e);
            CacheError::Remote(e)
        })?;

        self.publish(epoch, || {
            self.exams
                .apply(|exams| exams.iter().filter(|e| e.id != exam_id).cloned().collect())
        })
        .await;
        Ok(())
    }
}

/// Newest exam date first, matching the store's select order.
fn sort_exams(exams: &mut [Exam]) {
    exams.sort_by(|a, b| b.exam_date.cmp(&a.exam_date));
}
