pub mod closure;
pub mod instance;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::container::Resolver;
use crate::service::{BoxError, Instance, OutputType, Service};

pub use closure::ClosureProvider;
pub use instance::InstanceProvider;

/// A type-erased factory which constructs objects of one type.
///
/// A [`Provider`] is handed a [`Resolver`] on each request so that it can pull
/// in the object's dependencies. Providers are stateless and shared by every
/// caller; caching, locking and lifecycle hooks are the container's job, so
/// each call to [`Provider::dyn_provide`] should produce a new object.
///
/// Usually, you don't need to implement [`Provider`] manually, since this is
/// automatically done by [`TypedProvider`]'s blanket implementation.
#[cfg_attr(test, mockall::automock)]
pub trait Provider: Send + Sync + 'static {
    /// Provides a newly created type-erased object.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved or the object
    /// construction fails.
    fn dyn_provide(&self, resolver: Resolver) -> BoxFuture<'static, Result<Instance, BoxError>>;

    /// Returns the concrete type of the objects this provider produces.
    fn output(&self) -> OutputType;
}

/// A static variant of the [`Provider`] trait, leveraging static dispatch and
/// type-safety.
pub trait TypedProvider: Send + Sync + 'static {
    /// The type of objects produced in response to each request.
    type Output: Service;

    /// Provides a newly created object of type [`TypedProvider::Output`].
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be resolved or the object
    /// construction fails.
    fn provide(&self, resolver: Resolver) -> BoxFuture<'static, Result<Self::Output, BoxError>>;
}

impl<P: TypedProvider> Provider for P {
    fn dyn_provide(&self, resolver: Resolver) -> BoxFuture<'static, Result<Instance, BoxError>> {
        self.provide(resolver).map(|res| res.map(Instance::new)).boxed()
    }

    fn output(&self) -> OutputType {
        OutputType::of::<P::Output>()
    }
}
