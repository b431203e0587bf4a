//! crates/study_tracker_core/src/grouping.rs
//!
//! Groups snippets under the topic or subtopic they were saved against.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{CodeSnippet, Topic};

/// Label used for snippets whose topic id no longer matches the curriculum.
pub const UNKNOWN_TOPIC_LABEL: &str = "No topic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetGroup {
    pub topic_id: String,
    pub topic_title: String,
    pub snippets: Vec<CodeSnippet>,
}

/// Groups `snippets` by `topic_id`.
///
/// Groups are sorted by label; within a group the newest snippet comes first.
pub fn group_snippets_by_topic(snippets: &[CodeSnippet], topics: &[Topic]) -> Vec<SnippetGroup> {
    let mut labels: HashMap<&str, String> = HashMap::new();
    for topic in topics {
        labels.insert(&topic.id, format!("{}. {}", topic.number, topic.title));
        for sub in &topic.sub_topics {
            labels.insert(
                &sub.id,
                format!("{}. {} - {}", topic.number, topic.title, sub.title),
            );
        }
    }

    let mut groups: Vec<SnippetGroup> = Vec::new();
    for snippet in snippets {
        match groups.iter_mut().find(|g| g.topic_id == snippet.topic_id) {
            Some(group) => group.snippets.push(snippet.clone()),
            None => groups.push(SnippetGroup {
                topic_id: snippet.topic_id.clone(),
                topic_title: labels
                    .get(snippet.topic_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_TOPIC_LABEL.to_string()),
                snippets: vec![snippet.clone()],
            }),
        }
    }

    for group in &mut groups {
        group.snippets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    groups.sort_by(|a, b| a.topic_title.cmp(&b.topic_title));
    groups
}
