//! Infrastructure layer: adapters behind the domain ports plus process
//! bootstrap concerns (configuration loading, logging).

pub mod config;
pub mod document;
pub mod history;
pub mod logging;
pub mod process;
pub mod workspace;

pub use document::JsonDocumentQuery;
pub use history::FsBuildHistory;
pub use process::TokioProcessExecutor;
pub use workspace::LocalFileStore;
