//! crates/study_tracker_core/src/tree.rs
//!
//! Conversion between the flat `topics` rows (children point at their root via
//! `parent_id`) and the two-level `Topic` tree the cache publishes.

use std::collections::HashMap;

use tracing::warn;

use crate::domain::{SubTopic, Topic, TopicRow};

/// Rebuilds the topic tree from flat rows.
///
/// Roots come out in the order they were given. Children are appended to their
/// root in encounter order; a child whose parent is not among the roots is
/// dropped.
pub fn build_topic_tree(rows: &[TopicRow]) -> Vec<Topic> {
    let (roots, children): (Vec<&TopicRow>, Vec<&TopicRow>) =
        rows.iter().partition(|row| row.parent_id.is_none());

    let mut topics: Vec<Topic> = roots
        .iter()
        .map(|row| Topic {
            id: row.id.clone(),
            number: row.number.unwrap_or_default(),
            title: row.title.clone(),
            status: row.status,
            sub_topics: Vec::new(),
        })
        .collect();

    // The map only points into `topics`, which keeps the input order.
    let index: HashMap<&str, usize> = roots
        .iter()
        .enumerate()
        .map(|(i, row)| (row.id.as_str(), i))
        .collect();

    for child in children {
        let Some(parent_id) = child.parent_id.as_deref() else {
            continue;
        };
        match index.get(parent_id) {
            Some(&i) => topics[i].sub_topics.push(SubTopic {
                id: child.id.clone(),
                title: child.title.clone(),
                status: child.status,
            }),
            None => warn!(
                "Dropping subtopic row {} with unknown parent {}",
                child.id, parent_id
            ),
        }
    }

    topics
}

/// Flattens a topic tree into rows: each root followed by its children.
pub fn flatten_topic_tree(topics: &[Topic]) -> Vec<TopicRow> {
    let mut rows = Vec::with_capacity(topics.iter().map(|t| 1 + t.sub_topics.len()).sum());
    for topic in topics {
        rows.push(TopicRow {
            id: topic.id.clone(),
            number: Some(topic.number),
            title: topic.title.clone(),
            status: topic.status,
            parent_id: None,
        });
        rows.extend(topic.sub_topics.iter().map(|sub| TopicRow {
            id: sub.id.clone(),
            number: None,
            title: sub.title.clone(),
            status: sub.status,
            parent_id: Some(topic.id.clone()),
        }));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TopicStatus;

    fn root(id: &str, number: i32) -> TopicRow {
        TopicRow {
            id: id.to_string(),
            number: Some(number),
            title: format!("Topic {id}"),
            status: TopicStatus::NotStarted,
            parent_id: None,
        }
    }

    fn child(id: &str, parent: &str) -> TopicRow {
        TopicRow {
            id: id.to_string(),
            number: None,
            title: format!("Sub {id}"),
            status: TopicStatus::InProgress,
            parent_id: Some(parent.to_string()),
        }
    }

    #[test]
    fn children_attach_in_encounter_order() {
        let rows = vec![root("t1", 1), child("s1", "t1"), child("s2", "t1")];
        let tree = build_topic_tree(&rows);

        assert_eq!(tree.len(), 1);
        let ids: Vec<&str> = tree[0].sub_topics.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
        assert_eq!(tree[0].sub_topics[0].status, TopicStatus::InProgress);
    }

    #[test]
    fn orphan_child_is_dropped() {
        let rows = vec![root("t1", 1), child("s1", "t1"), child("x", "unknown")];
        let tree = build_topic_tree(&rows);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].sub_topics.len(), 1);
        assert!(tree
            .iter()
            .all(|t| t.id != "x" && t.sub_topics.iter().all(|s| s.id != "x")));
    }

    #[test]
    fn roots_keep_query_order_even_with_children_first() {
        let rows = vec![
            child("c3", "t3"),
            root("t1", 1),
            root("t3", 3),
            root("t2", 2),
            child("c1", "t1"),
        ];
        let tree = build_topic_tree(&rows);

        let ids: Vec<&str> = tree.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t3", "t2"]);
        assert_eq!(tree[1].sub_topics[0].id, "c3");
    }

    #[test]
    fn flatten_then_build_is_identity() {
        let tree = crate::curriculum::default_topics();
        let rows = flatten_topic_tree(&tree);
        assert_eq!(rows[0].parent_id, None);
        assert_eq!(rows[2].parent_id.as_deref(), Some("topic-2"));
        assert_eq!(build_topic_tree(&rows), tree);
    }
}
