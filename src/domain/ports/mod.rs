//! Port trait definitions (hexagonal architecture).
//!
//! These async interfaces are the seams between the pipeline and its
//! process, filesystem, document and build-history collaborators.

pub mod document;
pub mod history;
pub mod process;
pub mod workspace;

pub use document::{DocumentQuery, QueryValue};
pub use history::{BuildHistory, BuildRecord};
pub use process::{OutputSink, ProcessExecutor, StreamOrigin};
pub use workspace::FileStore;
