//! Registries populated while building a schema.

mod annotation;
mod identity;
mod module;
mod namespace;

pub use annotation::{AnnotationRegistry, YangAnnotation};
pub use identity::{IdentityRegistry, YangIdentity};
pub use module::ModuleRegistry;
pub use namespace::ModuleAndNamespaceResolver;
