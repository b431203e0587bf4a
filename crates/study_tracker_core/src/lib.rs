pub mod cache;
pub mod curriculum;
pub mod domain;
pub mod grouping;
pub mod ports;
pub mod session;
pub mod tree;
pub mod workspace;

pub use cache::{CacheError, DataCache, LoadReport, Slot};
pub use domain::{
    CodeSnippet, Exam, ExamDraft, ExamTiming, GradeStatus, Identity, SnippetDraft, SubTopic,
    Topic, TopicRow, TopicStatus, User, UserCredentials,
};
pub use grouping::{group_snippets_by_topic, SnippetGroup};
pub use ports::{AccountService, PortError, PortResult, StudyStore};
pub use session::{SessionEvent, SessionState, SessionStore};
pub use tree::{build_topic_tree, flatten_topic_tree};
pub use workspace::{Workspace, Workspaces};
