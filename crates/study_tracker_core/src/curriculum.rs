//! crates/study_tracker_core/src/curriculum.rs
//!
//! The fixed course every new user starts from. It is written to the store the
//! first time a user's topic table comes back empty.

use crate::domain::{SubTopic, Topic, TopicStatus};

const COURSE: &[(&str, &[&str])] = &[
    ("Variables", &[]),
    (
        "Condicionales",
        &[
            "Condicionales simples",
            "Condicionales dobles",
            "Condicionales dobles complejo",
            "Switch simple",
            "Switch complejo",
        ],
    ),
    (
        "Bucles",
        &[
            "For simple",
            "For complejo",
            "While simple",
            "While complejo",
            "Do while simple",
            "Do while complejo",
        ],
    ),
    (
        "Funciones",
        &[
            "Funciones simples",
            "Funciones sin parametros",
            "Funciones con parametros",
            "Funciones complejas",
        ],
    ),
    ("Tablas", &[]),
    ("Cadenas", &[]),
    ("Clases", &[]),
    ("Herencia", &[]),
    ("Interfaces", &[]),
    ("Ficheros", &[]),
];

/// The default curriculum, every entry `not_started`.
///
/// Ids are `topic-{n}` for roots and `topic-{n}-{m}` for subtopics.
pub fn default_topics() -> Vec<Topic> {
    COURSE
        .iter()
        .zip(1..)
        .map(|(&(title, subs), number)| Topic {
            id: format!("topic-{number}"),
            number,
            title: title.to_string(),
            status: TopicStatus::NotStarted,
            sub_topics: subs
                .iter()
                .zip(1..)
                .map(|(sub, n)| SubTopic {
                    id: format!("topic-{number}-{n}"),
                    title: sub.to_string(),
                    status: TopicStatus::NotStarted,
                })
                .collect(),
        })
        .collect()
}
