pub mod config;
pub mod console;
pub mod error;
pub mod operations;
pub mod pool;
pub mod project;
pub mod registry;
pub mod scores;
pub mod source;
pub mod tree;

pub use config::{ConfigStore, FileStore, MemoryStore, Options, Overrides, ResolverKind};
pub use error::{ErrorKind, NscmError};
pub use project::{Manifest, Project};
pub use registry::{RegistryClient, WhitelistEntry};
pub use source::{AnySource, NpmConfig, TreeSource};
pub use tree::{FlatPackage, PackageNode, PackageSpec};

pub type Result<T> = std::result::Result<T, NscmError>;
