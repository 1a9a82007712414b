pub mod options;
pub mod rc;
pub mod store;

pub use options::{Options, Overrides, RegistryDiscovery, ResolverKind, resolve_options};
pub use rc::{RcFile, RcLine};
pub use store::{ConfigStore, FileStore, MemoryStore};
