#![allow(clippy::new_without_default)]

pub mod container;
pub mod discovery;
pub mod module;
pub mod provider;
pub mod scope;
pub mod service;
pub mod token;
mod util;

pub use async_trait::async_trait;

pub mod prelude {
    pub use crate::async_trait;
    pub use crate::container::registry::{
        Configurer, RegistryError, SingletonOptions, TypedConfigurer,
    };
    pub use crate::container::resolver::ResolveError;
    pub use crate::container::{BuildOptions, Container, DisposalFailed, DisposeError, Resolver};
    pub use crate::discovery::{DiscoveryService, ServiceDescriptor};
    pub use crate::module::{Configuration, Module};
    pub use crate::scope::{inherit, Lifetime, RequestScope, ScopeStore};
    pub use crate::service::{BoxError, OnConstruct, OnDispose, Service};
    pub use crate::token::{ServiceKey, Tag, Token};
}
