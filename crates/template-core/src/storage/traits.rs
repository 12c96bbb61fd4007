//! Entity store trait definition.
//!
//! The `TemplateStore` trait is the single-item CRUD surface every backend
//! implements. All coordination between concurrent writers happens through
//! [`TemplateStore::conditional_update`]; backends never expose locks.

use uuid::Uuid;

use super::types::{Template, TemplateKey};
use super::update::UpdateCommand;
use crate::error::Result;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The condition held; carries the item as written.
    Updated(Template),
    /// The condition did not hold; carries the rejected prior image, if any.
    ConditionFailed { old: Option<Template> },
}

impl WriteOutcome {
    pub fn updated(self) -> Option<Template> {
        match self {
            WriteOutcome::Updated(template) => Some(template),
            WriteOutcome::ConditionFailed { .. } => None,
        }
    }
}

/// Partitioned key-value store for templates.
///
/// All implementations must ensure:
/// - Every write is atomic with respect to its condition
/// - Items are keyed by `(owner, id)` with a secondary lookup on `id`
/// - Stored images round-trip without loss
pub trait TemplateStore: Send + Sync {
    /// Fetch the stored image for a key, including `DELETED` items.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Storage` if the backend cannot be read or the
    /// stored document does not parse.
    fn get_item(&self, key: &TemplateKey) -> Result<Option<Template>>;

    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Storage` if an item with the same key already
    /// exists or the write fails.
    fn put_new(&self, template: &Template) -> Result<()>;

    /// Atomically evaluate `command.condition` against the stored image and,
    /// if it holds, apply `command.mutations`.
    ///
    /// A missing item is never created; the condition is evaluated against
    /// `None` and the outcome is always [`WriteOutcome::ConditionFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected failures. A condition that does
    /// not hold is an `Ok` outcome.
    fn conditional_update(&self, command: &UpdateCommand) -> Result<WriteOutcome>;

    /// Resolve the partition key for a template id.
    fn owner_for_id(&self, id: &Uuid) -> Result<Option<String>>;

    /// All items in a partition, most recently updated first.
    fn list_owner(&self, owner: &str) -> Result<Vec<Template>>;

    /// Physically remove `DELETED` items whose `ttl` is at or before `now`.
    ///
    /// # Returns
    ///
    /// The number of items removed.
    fn purge_expired(&self, now: i64) -> Result<usize>;
}
