//! Record type definitions: declared fields and the ordered schema built
//! from them.
//!
//! A schema is built once per record type, either through
//! [`RecordSchema::builder`] or through the [`record_type!`](crate::record_type)
//! macro, and shared by every record of that type.
//!
//! ```
//! use harvest_core::field::RecordSchema;
//!
//! let schema = RecordSchema::builder("Article")
//!     .field("url")
//!     .field("title")
//!     .build()
//!     .unwrap();
//! assert_eq!(schema.field_names(), ["url", "title"]);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;

/// One named slot of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    declaration_order: usize,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field in the builder call that declared it.
    pub fn declaration_order(&self) -> usize {
        self.declaration_order
    }
}

/// Immutable, ordered set of field names for a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    type_name: String,
    descriptors: Vec<FieldDescriptor>,
    field_names: Arc<[String]>,
}

impl RecordSchema {
    pub fn builder(type_name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            type_name: type_name.into(),
            descriptors: Vec::new(),
        }
    }

    /// Schema for a [`record_type!`](crate::record_type) declaration, whose
    /// field names are unique identifiers by construction.
    #[doc(hidden)]
    pub fn from_declared_fields(type_name: &str, fields: &[&str]) -> Self {
        let descriptors: Vec<FieldDescriptor> = fields
            .iter()
            .enumerate()
            .map(|(declaration_order, name)| FieldDescriptor {
                name: (*name).to_string(),
                declaration_order,
            })
            .collect();
        let field_names = fields
            .iter()
            .map(|name| (*name).to_string())
            .collect::<Vec<_>>()
            .into();
        Self {
            type_name: type_name.to_string(),
            descriptors,
            field_names,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Shared handle to the ordered field names, used as a store's key set.
    pub(crate) fn allowed_keys(&self) -> Arc<[String]> {
        Arc::clone(&self.field_names)
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Declaration index of `name`, if the schema declares it.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|field| field == name)
    }

    pub fn len(&self) -> usize {
        self.field_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_names.is_empty()
    }
}

impl fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.field_names.join(","))
    }
}

/// Collects field declarations for one record type.
#[derive(Debug, Clone)]
pub struct RecordSchemaBuilder {
    type_name: String,
    descriptors: Vec<FieldDescriptor>,
}

impl RecordSchemaBuilder {
    /// Declare the next field. Order of calls is the schema order.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        let declaration_order = self.descriptors.len();
        self.descriptors.push(FieldDescriptor {
            name: name.into(),
            declaration_order,
        });
        self
    }

    pub fn fields<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |builder, name| builder.field(name))
    }

    /// Finish the schema, rejecting duplicate or empty field names.
    pub fn build(self) -> Result<RecordSchema, AppError> {
        let mut seen = HashSet::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            if descriptor.name.is_empty() || !seen.insert(descriptor.name.as_str()) {
                return Err(AppError::SchemaConflict {
                    schema: self.type_name,
                    field: descriptor.name.clone(),
                });
            }
        }

        let mut descriptors = self.descriptors;
        descriptors.sort_by_key(FieldDescriptor::declaration_order);
        let field_names = descriptors
            .iter()
            .map(|d| d.name.clone())
            .collect::<Vec<_>>()
            .into();

        tracing::debug!(
            record_type = %self.type_name,
            fields = descriptors.len(),
            "Record schema built"
        );

        Ok(RecordSchema {
            type_name: self.type_name,
            descriptors,
            field_names,
        })
    }
}
