//! Built-in operator schemas.

use crate::errors::RegistryError;
use crate::schema_registry::SchemaRegistry;

mod experiments;
mod logical;
mod reduction;


pub use logical::binary_logic_fragment;
pub use reduction::{arg_reduce_fragment, reduce_fragment};

/// Register all built-in operator schemas.
///
/// This is normally called once at startup via
/// [`SchemaRegistry::with_all_ops`]. Registries created with
/// [`SchemaRegistry::new`] can call it to add the built-in schemas alongside
/// custom ones.
pub fn register_all_schemas(reg: &mut SchemaRegistry) -> Result<(), RegistryError> {
    logical::register(reg)?;
    reduction::register(reg)?;
    experiments::register(reg)?;
    Ok(())
}
