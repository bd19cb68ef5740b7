mod configurer;
mod registration;
mod service_map;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::Resolver;
use crate::module::Module;
use crate::provider::{ClosureProvider, InstanceProvider, Provider};
use crate::scope::Lifetime;
use crate::service::{BoxError, Service};
use crate::token::{ServiceKey, Token};

pub(crate) use configurer::ConfigurerImpl;
pub(crate) use registration::Registration;
pub(crate) use service_map::ServiceMap;

/// The registration surface of a container, handed to [`Module`]s.
///
/// This trait is object-safe so that modules can receive a
/// `&mut dyn Configurer`. The typed registration methods live in
/// [`TypedConfigurer`], which is implemented for every [`Configurer`].
pub trait Configurer: Send + Sync + 'static {
    #[doc(hidden)]
    #[allow(private_interfaces)]
    fn as_private(&mut self) -> &mut dyn ConfigurerPrivate;
}

pub(crate) trait ConfigurerPrivate: Configurer {
    fn dyn_register(
        &mut self,
        key: ServiceKey,
        lifetime: Lifetime,
        provider: Box<dyn Provider>,
        eager: bool,
    ) -> Result<(), RegistryError>;

    fn dyn_add_module(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError>;
}

/// Typed registration helpers available on every [`Configurer`].
///
/// Registering a (token, tag) pair which already exists under the same
/// lifetime replaces the old registration. Registering a token under a
/// lifetime different from the one it already uses fails with
/// [`RegistryError::CrossLifecycleRegistration`].
pub trait TypedConfigurer: Configurer {
    /// Registers a factory whose object is built once and shared for the
    /// lifetime of the container.
    fn add_singleton<F, Fut, T>(
        &mut self,
        key: impl Into<ServiceKey>,
        factory: F,
        options: SingletonOptions,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Service,
    {
        self.as_private().dyn_register(
            key.into(),
            Lifetime::Singleton,
            Box::new(ClosureProvider::new(factory)),
            options.eager,
        )?;
        Ok(self)
    }

    /// Registers a factory whose object is built once per request scope.
    fn add_scoped<F, Fut, T>(
        &mut self,
        key: impl Into<ServiceKey>,
        factory: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Service,
    {
        self.as_private().dyn_register(
            key.into(),
            Lifetime::Scoped,
            Box::new(ClosureProvider::new(factory)),
            false,
        )?;
        Ok(self)
    }

    /// Registers a factory which runs on every resolution.
    fn add_transient<F, Fut, T>(
        &mut self,
        key: impl Into<ServiceKey>,
        factory: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Service,
    {
        self.as_private().dyn_register(
            key.into(),
            Lifetime::Transient,
            Box::new(ClosureProvider::new(factory)),
            false,
        )?;
        Ok(self)
    }

    /// Registers a pre-built value as a singleton.
    fn add_instance<T>(
        &mut self,
        key: impl Into<ServiceKey>,
        instance: T,
    ) -> Result<&mut Self, RegistryError>
    where
        T: Service + Clone,
    {
        self.as_private().dyn_register(
            key.into(),
            Lifetime::Singleton,
            Box::new(InstanceProvider::new(instance)),
            false,
        )?;
        Ok(self)
    }

    /// Registers a hand-written provider under an arbitrary lifetime.
    /// `options` only matters for singletons.
    fn add_provider<P>(
        &mut self,
        key: impl Into<ServiceKey>,
        lifetime: Lifetime,
        provider: P,
        options: SingletonOptions,
    ) -> Result<&mut Self, RegistryError>
    where
        P: Provider,
    {
        self.as_private()
            .dyn_register(key.into(), lifetime, Box::new(provider), options.eager)?;
        Ok(self)
    }

    /// Lets `module` register its services. Adding the same module object
    /// twice is a no-op.
    fn add_module(&mut self, module: Arc<dyn Module>) -> Result<&mut Self, RegistryError> {
        self.as_private().dyn_add_module(module)?;
        Ok(self)
    }
}

impl<T: Configurer + ?Sized> TypedConfigurer for T {}

/// Options of a singleton registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingletonOptions {
    /// Whether `Container::build` constructs the object up front.
    pub eager: bool,
}

impl SingletonOptions {
    pub fn lazy() -> Self {
        Self { eager: false }
    }

    pub fn eager() -> Self {
        Self { eager: true }
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum RegistryError {
    #[snafu(display(
        "could not register {token} as {requested} since it is already registered as {existing}"
    ))]
    #[non_exhaustive]
    CrossLifecycleRegistration {
        token: Token,
        existing: Lifetime,
        requested: Lifetime,
    },
    #[snafu(display("module {module} fails to register its services"))]
    #[non_exhaustive]
    Module {
        module: &'static str,
        source: BoxError,
    },
    #[snafu(display("aggregated registry errors:\n{}", AggregatedDisplayer::new(errors.as_slice())))]
    #[non_exhaustive]
    Aggregated { errors: Vec<RegistryError> },
}

impl RegistryError {
    /// Wraps the failure of a module. Registry errors raised while the module
    /// was registering are passed through unchanged.
    pub(crate) fn from_module(module: &'static str, err: BoxError) -> Self {
        match err.downcast::<RegistryError>() {
            Ok(err) => *err,
            Err(source) => Self::Module { module, source },
        }
    }
}

pub(crate) struct AggregatedDisplayer<'a, E> {
    errors: &'a [E],
}

impl<'a, E> AggregatedDisplayer<'a, E> {
    pub(crate) fn new(errors: &'a [E]) -> Self {
        Self { errors }
    }
}

impl<E: Display> Display for AggregatedDisplayer<'_, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, error)?;
        }
        Ok(())
    }
}
