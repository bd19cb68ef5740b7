pub mod registry;
pub mod resolver;

mod core;
mod handle;
mod lifecycle;

pub use handle::{BuildOptions, Container, Resolver};
pub use lifecycle::{DisposalFailed, DisposeError};
