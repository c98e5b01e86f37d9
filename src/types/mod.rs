// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed runtime IDs, image references, DNS-safe names, and secrets.

mod id;
mod image_ref;
mod name;
mod network_alias;
mod secret;

pub use id::{ContainerId, Id, NetworkId};
pub use image_ref::{DEFAULT_REGISTRY, ImageRef, ParseImageRefError};
pub(crate) use image_ref::normalize_registry;
pub use name::{NameError, ServiceName, StackName};
pub use network_alias::{NetworkAlias, NetworkAliasError};
pub use secret::Secret;
