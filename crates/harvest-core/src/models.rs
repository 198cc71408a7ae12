use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::field::RecordSchema;

/// Record type definition as stored on disk.
///
/// ```json
/// { "name": "Article", "fields": ["url", "title", "published_at"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Record type name. Defaults to the name the schema was resolved under.
    #[serde(default)]
    pub name: Option<String>,
    /// Field names in declaration order.
    pub fields: Vec<String>,
}

impl SchemaDefinition {
    /// Build the record schema, using `fallback_name` when the definition
    /// does not name its type.
    pub fn into_schema(self, fallback_name: &str) -> Result<RecordSchema, AppError> {
        let type_name = self.name.unwrap_or_else(|| fallback_name.to_string());
        RecordSchema::builder(type_name).fields(self.fields).build()
    }
}

impl From<&RecordSchema> for SchemaDefinition {
    fn from(schema: &RecordSchema) -> Self {
        Self {
            name: Some(schema.type_name().to_string()),
            fields: schema.field_names().to_vec(),
        }
    }
}
