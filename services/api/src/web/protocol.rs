//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server. The server pushes a whole collection every time its slot in the
//! cache changes; the client never has to merge partial updates.

use serde::{Deserialize, Serialize};
use study_tracker_core::domain::{CodeSnippet, Exam, Topic};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Re-fetches all three collections from the store.
    Reload,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full topic tree.
    Topics { topics: Vec<Topic> },
    /// All snippets, newest first.
    Snippets { snippets: Vec<CodeSnippet> },
    /// All exams, latest date first.
    Exams { exams: Vec<Exam> },
    /// Something went wrong; the client should show the message.
    Error { message: String },
    /// The session ended. The server closes the socket after sending this.
    SignedOut,
}
