//! Template storage: data model, write conditions, and backends.

pub mod condition;
pub mod sqlite;
pub mod traits;
pub mod types;
pub mod update;

pub use condition::Condition;
pub use sqlite::SqliteTemplateStore;
pub use traits::{TemplateStore, WriteOutcome};
pub use update::{Mutation, UpdateBuilder, UpdateCommand};
