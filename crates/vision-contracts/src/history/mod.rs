mod entry;
mod store;

pub use entry::{Citation, GeneratedResult, EDIT_PROMPT_PREFIX};
pub use store::{HistoryStore, HISTORY_FILE_NAME, HISTORY_SCHEMA_VERSION};
