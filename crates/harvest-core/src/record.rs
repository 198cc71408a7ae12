//! Schema-bound records.
//!
//! A [`Record`] stores its declared fields in a [`RestrictedStore`] bound to
//! the record type's [`RecordSchema`]. Two access surfaces exist:
//!
//! - attribute-style ([`Record::attr`] / [`Record::set_attr`] and the
//!   per-field accessors generated by [`record_type!`](crate::record_type)):
//!   declared names go through the store, any other name lands in a separate
//!   extras bag that is never validated and never part of the record's data;
//! - mapping-style ([`Record::get`] / [`Record::set`]): declared names only,
//!   anything else is [`AppError::FieldNotDeclared`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
pub use serde_json::Value;

use crate::error::AppError;
use crate::field::RecordSchema;
use crate::store::RestrictedStore;
use crate::util::compute_hash;

/// A structured value bound to a record schema.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    store: RestrictedStore<Value>,
    extras: BTreeMap<String, Value>,
}

impl Record {
    /// Create a record with no populated fields.
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let store = RestrictedStore::new(schema.allowed_keys());
        Self {
            schema,
            store,
            extras: BTreeMap::new(),
        }
    }

    /// Build a record from positional and named values.
    ///
    /// Positional values are assigned to schema fields left to right, then
    /// merged with the named values. A field that receives two values is a
    /// [`AppError::DuplicateFieldAssignment`].
    pub fn build<P, N, K>(schema: Arc<RecordSchema>, positional: P, named: N) -> Result<Self, AppError>
    where
        P: IntoIterator<Item = Value>,
        N: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let positional: Vec<Value> = positional.into_iter().collect();
        if positional.len() > schema.len() {
            return Err(AppError::TooManyPositional {
                expected: schema.len(),
                got: positional.len(),
            });
        }

        let mut assignments: Vec<(String, Value)> = schema
            .field_names()
            .iter()
            .cloned()
            .zip(positional)
            .collect();

        for (name, value) in named {
            let name = name.into();
            if !schema.contains(&name) {
                return Err(AppError::FieldNotDeclared(name));
            }
            if assignments.iter().any(|(assigned, _)| *assigned == name) {
                return Err(AppError::DuplicateFieldAssignment(name));
            }
            assignments.push((name, value));
        }

        let store = RestrictedStore::with_entries(schema.allowed_keys(), assignments)?;
        Ok(Self {
            schema,
            store,
            extras: BTreeMap::new(),
        })
    }

    pub fn from_positional<P>(schema: Arc<RecordSchema>, values: P) -> Result<Self, AppError>
    where
        P: IntoIterator<Item = Value>,
    {
        Self::build(schema, values, std::iter::empty::<(String, Value)>())
    }

    pub fn from_named<N, K>(schema: Arc<RecordSchema>, pairs: N) -> Result<Self, AppError>
    where
        N: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::build(schema, std::iter::empty::<Value>(), pairs)
    }

    /// Build a record from an extracted JSON object.
    pub fn from_json(schema: Arc<RecordSchema>, data: &Value) -> Result<Self, AppError> {
        let object = data.as_object().ok_or_else(|| {
            AppError::InvalidRecordData(format!(
                "expected a JSON object for {}, got {}",
                schema.type_name(),
                json_kind(data)
            ))
        })?;
        Self::from_named(
            schema,
            object.iter().map(|(key, value)| (key.clone(), value.clone())),
        )
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    /// Attribute-style read: declared names read the store, other names
    /// read the extras bag.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        if self.schema.contains(name) {
            self.store.get(name)
        } else {
            self.extras.get(name)
        }
    }

    /// Attribute-style write: declared names write the store, other names
    /// write the extras bag.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Err((name, value)) = self.store.try_set(name.into(), value.into()) {
            self.extras.insert(name, value);
        }
    }

    /// Mapping-style read. `Ok(None)` means declared but not populated.
    pub fn get(&self, name: &str) -> Result<Option<&Value>, AppError> {
        self.check_declared(name)?;
        Ok(self.store.get(name))
    }

    /// Mapping-style write, restricted to declared fields.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AppError> {
        self.check_declared(name)?;
        self.store.set(name, value.into())
    }

    /// Clear a declared field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Result<Option<Value>, AppError> {
        self.check_declared(name)?;
        Ok(self.store.remove(name))
    }

    fn check_declared(&self, name: &str) -> Result<(), AppError> {
        if self.schema.contains(name) {
            Ok(())
        } else {
            Err(AppError::FieldNotDeclared(name.to_string()))
        }
    }

    /// Number of populated fields (not the schema size).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// All declared field names in declaration order, populated or not.
    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema.field_names().iter().map(String::as_str)
    }

    /// Populated fields in declaration order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.store.iter()
    }

    pub fn store(&self) -> &RestrictedStore<Value> {
        &self.store
    }

    /// Auxiliary attributes set through attribute-style access on
    /// undeclared names.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    /// SHA-256 of the record's JSON form, for change detection.
    pub fn content_hash(&self) -> Result<String, AppError> {
        let canonical = serde_json::to_string(self)?;
        Ok(compute_hash(&canonical))
    }
}

impl PartialEq for Record {
    /// Records are equal when they share a type and their populated
    /// fields match. Extras are not part of the comparison.
    fn eq(&self, other: &Self) -> bool {
        self.schema.type_name() == other.schema.type_name() && self.store == other.store
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.fields())
    }
}

/// Renders `Type(field=value,...)` over populated fields in schema order.
/// Values are written as JSON, so strings appear quoted (`url="a"`) and a
/// string can never be confused with a number or `null`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name())?;
        for (i, (key, value)) in self.items().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, ")")
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.items() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Names a [`record_type!`](crate::record_type) field cannot take, because
/// the generated accessor would shadow or clash with a method of the record.
pub const RESERVED_FIELD_NAMES: &[&str] = &[
    "attr",
    "build",
    "clone",
    "content_hash",
    "deref",
    "deref_mut",
    "eq",
    "extras",
    "fields",
    "fmt",
    "from",
    "from_json",
    "from_named",
    "from_positional",
    "get",
    "into",
    "into_iter",
    "into_record",
    "is_empty",
    "items",
    "len",
    "ne",
    "new",
    "record_schema",
    "remove",
    "schema",
    "serialize",
    "set",
    "store",
    "to_string",
    "type_name",
];

/// Field name for a declared identifier, without any `r#` prefix.
#[doc(hidden)]
pub fn declared_field_name(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

/// Compile-time check used by `record_type!`.
#[doc(hidden)]
pub const fn is_reserved_field_name(ident: &str) -> bool {
    let mut name = ident.as_bytes();
    if name.len() > 2 && name[0] == b'r' && name[1] == b'#' {
        name = name.split_at(2).1;
    }
    let mut i = 0;
    while i < RESERVED_FIELD_NAMES.len() {
        if bytes_eq(RESERVED_FIELD_NAMES[i].as_bytes(), name) {
            return true;
        }
        i += 1;
    }
    false
}

const fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Declare a record type with a cached schema and per-field accessors.
///
/// Field order in the declaration is the schema order. Declaring the same
/// field twice fails to compile. Keywords are declared as raw identifiers
/// (`r#type`) and map to the plain name (`"type"`) in the schema.
///
/// ```
/// harvest_core::record_type! {
///     pub struct Article { url, title }
/// }
///
/// let mut article = Article::new();
/// article.set_url("https://example.com");
/// assert_eq!(article.url().and_then(|v| v.as_str()), Some("https://example.com"));
/// assert_eq!(article.to_string(), r#"Article(url="https://example.com")"#);
/// ```
///
/// Field names listed in [`RESERVED_FIELD_NAMES`](crate::record::RESERVED_FIELD_NAMES)
/// are rejected at compile time:
///
/// ```compile_fail
/// harvest_core::record_type! {
///     pub struct Product { name, len }
/// }
/// ```
#[macro_export]
macro_rules! record_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($field:ident),* $(,)? }
    ) => {
        $crate::__paste! {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            $vis struct $name($crate::record::Record);

            $(
                const _: () = if $crate::record::is_reserved_field_name(stringify!($field)) {
                    panic!(concat!(
                        "record_type! field `",
                        stringify!($field),
                        "` clashes with a Record method, rename it"
                    ));
                };
            )*

            impl $name {
                /// Schema shared by every instance, built on first use.
                pub fn record_schema() -> &'static ::std::sync::Arc<$crate::field::RecordSchema> {
                    #[allow(non_camel_case_types, dead_code)]
                    enum DeclaredFields { $($field),* }

                    static SCHEMA: ::std::sync::OnceLock<
                        ::std::sync::Arc<$crate::field::RecordSchema>,
                    > = ::std::sync::OnceLock::new();
                    SCHEMA.get_or_init(|| {
                        ::std::sync::Arc::new($crate::field::RecordSchema::from_declared_fields(
                            stringify!($name),
                            &[$($crate::record::declared_field_name(stringify!($field))),*],
                        ))
                    })
                }

                pub fn new() -> Self {
                    Self($crate::record::Record::new(::std::sync::Arc::clone(Self::record_schema())))
                }

                pub fn build<P, N, K>(positional: P, named: N) -> Result<Self, $crate::error::AppError>
                where
                    P: IntoIterator<Item = $crate::record::Value>,
                    N: IntoIterator<Item = (K, $crate::record::Value)>,
                    K: Into<String>,
                {
                    $crate::record::Record::build(
                        ::std::sync::Arc::clone(Self::record_schema()),
                        positional,
                        named,
                    )
                    .map(Self)
                }

                pub fn from_json(data: &$crate::record::Value) -> Result<Self, $crate::error::AppError> {
                    $crate::record::Record::from_json(::std::sync::Arc::clone(Self::record_schema()), data)
                        .map(Self)
                }

                pub fn into_record(self) -> $crate::record::Record {
                    self.0
                }

                $(
                    pub fn $field(&self) -> Option<&$crate::record::Value> {
                        self.0.attr($crate::record::declared_field_name(stringify!($field)))
                    }

                    pub fn [<set_ $field>](&mut self, value: impl Into<$crate::record::Value>) {
                        self.0.set_attr($crate::record::declared_field_name(stringify!($field)), value)
                    }
                )*
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl ::std::ops::Deref for $name {
                type Target = $crate::record::Record;

                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }

            impl ::std::ops::DerefMut for $name {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.0
                }
            }

            impl ::std::fmt::Display for $name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    ::std::fmt::Display::fmt(&self.0, f)
                }
            }

            impl $crate::__serde::Serialize for $name {
                fn serialize<S: $crate::__serde::Serializer>(
                    &self,
                    serializer: S,
                ) -> Result<S::Ok, S::Error> {
                    $crate::__serde::Serialize::serialize(&self.0, serializer)
                }
            }

            impl From<$name> for $crate::record::Record {
                fn from(value: $name) -> Self {
                    value.0
                }
            }
        }
    };
}
