//! Core primitives for the harvest extraction pipeline: schema-bound
//! records and fan-in joins over pending operations.

pub mod error;
pub mod fan_in;
pub mod field;
pub mod handle;
pub mod models;
pub mod record;
pub mod schema;
pub mod store;
pub mod traits;
pub mod util;

#[cfg(test)]
mod testutil;

pub use error::AppError;
pub use fan_in::{FanIn, FanInInput, FanInResults, FanInState};
pub use field::{FieldDescriptor, RecordSchema, RecordSchemaBuilder};
pub use handle::FutureHandle;
pub use models::SchemaDefinition;
pub use record::Record;
pub use schema::{ResolvedSchema, ResolverConfig, SchemaResolver};
pub use store::RestrictedStore;
pub use traits::{AsyncHandle, Continuation};
pub use util::compute_hash;

#[doc(hidden)]
pub use paste::paste as __paste;
#[doc(hidden)]
pub use serde as __serde;
