//! Template row type for database queries.

use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::storage::types::Template;

/// Raw row data from the templates table, before parsing into domain types.
#[derive(Debug)]
pub struct TemplateRow {
    pub owner: String,
    pub id: String,
    pub item_json: String,
}

impl TryFrom<TemplateRow> for Template {
    type Error = TemplateError;

    fn try_from(row: TemplateRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| TemplateError::Storage(format!("Invalid template UUID: {}", e)))?;
        let template: Template = serde_json::from_str(&row.item_json)
            .map_err(|e| TemplateError::Storage(format!("Invalid template JSON: {}", e)))?;

        if template.id != id || template.owner != row.owner {
            return Err(TemplateError::Storage(format!(
                "Template document {} does not match its key {}/{}",
                template.id, row.owner, id
            )));
        }

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_uuid_is_storage_error() {
        let row = TemplateRow {
            owner: "CLIENT#c".to_string(),
            id: "not-a-uuid".to_string(),
            item_json: "{}".to_string(),
        };
        let err = Template::try_from(row).unwrap_err();
        assert!(matches!(err, TemplateError::Storage(_)));
    }
}
