//! Backend descriptors, registry, selection and fallback rotation
//!
//! Leaves of the routing cluster: nothing in here performs I/O.

pub mod backend;
pub mod balancer;
pub mod registry;
pub mod selector;

pub use backend::{Backend, BackendId, BackendKind, Capability, ModelSpec};
pub use balancer::{DEFAULT_FALLBACK_CANDIDATES, LoadBalancer};
pub use registry::ProviderRegistry;
pub use selector::{ModelSelector, meets_constraints};
