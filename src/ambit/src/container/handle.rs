use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::core::ContainerCore;
use crate::container::lifecycle::{DisposalFailed, DisposeError};
use crate::container::registry::{
    Configurer, ConfigurerImpl, ConfigurerPrivate, Registration, RegistryError, ServiceMap,
    TypedConfigurer,
};
use crate::container::resolver::ResolveError;
use crate::discovery::DiscoveryService;
use crate::module::Module;
use crate::scope::{RequestScope, ScopeStore};
use crate::service::Service;
use crate::token::{ServiceKey, Tag, Token};

/// A dependency injection container.
///
/// A [`Container`] is the configuration side: services are registered on it
/// through [`TypedConfigurer`], directly or from [`Module`]s. Objects are
/// obtained from the [`Resolver`] returned by [`Container::build`].
/// Registration stays open after `build`, and resolvers always see the live
/// registry.
///
/// ```rust
/// # use ambit::prelude::*;
/// const GREETING: Token = Token::named("greeting");
///
/// # async fn demo() -> Result<(), BoxError> {
/// let mut container = Container::new();
/// container.add_singleton(
///     &GREETING,
///     |_| async { Ok(String::from("hello")) },
///     SingletonOptions::eager(),
/// )?;
///
/// let resolver = container.build(BuildOptions::default()).await?;
/// let greeting = resolver.resolve::<String>(&GREETING).await?;
/// assert_eq!(greeting.as_str(), "hello");
/// # Ok(())
/// # }
/// ```
pub struct Container {
    configurer: ConfigurerImpl,
    core: Arc<ContainerCore>,
}

impl Container {
    pub fn new() -> Self {
        let services = Arc::new(RwLock::new(ServiceMap::new()));
        Self {
            configurer: ConfigurerImpl::new(Arc::clone(&services)),
            core: Arc::new(ContainerCore::new(services)),
        }
    }

    /// Creates a container configured by `module`.
    pub fn init<M: Module>(module: M) -> Result<Self, RegistryError> {
        let mut container = Self::new();
        container.add_module(Arc::new(module))?;
        Ok(container)
    }

    /// Produces a resolver. Unless disabled by `options`, every eager
    /// singleton is constructed before this returns.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while constructing an eager singleton.
    pub async fn build(&self, options: BuildOptions) -> Result<Resolver, ResolveError> {
        if options.auto_init {
            self.core.init_eager_singletons().await?;
        } else {
            tracing::debug!("skipped constructing eager singletons");
        }
        Ok(self.resolver())
    }

    /// Returns a resolver without constructing eager singletons.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.core))
    }

    pub fn discovery(&self) -> DiscoveryService {
        DiscoveryService::new(Arc::clone(self.core.services()))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurer for Container {
    #[allow(private_interfaces)]
    fn as_private(&mut self) -> &mut dyn ConfigurerPrivate {
        self.configurer.as_private()
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Container")
            .field("services", &self.core.services().read().all().len())
            .finish_non_exhaustive()
    }
}

/// Options of [`Container::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Whether eager singletons are constructed during `build`.
    pub auto_init: bool,
}

impl BuildOptions {
    pub fn without_auto_init() -> Self {
        Self { auto_init: false }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { auto_init: true }
    }
}

/// A cheap, cloneable handle resolving objects from a container.
///
/// Every factory receives its own [`Resolver`] to pull in dependencies.
/// Cycle detection and the active request scope are carried by the calling
/// task, so a resolver can be freely cloned and moved.
#[derive(Clone)]
pub struct Resolver {
    core: Arc<ContainerCore>,
}

impl Resolver {
    pub(crate) fn new(core: Arc<ContainerCore>) -> Self {
        Self { core }
    }

    /// Resolves the object registered under `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`ResolveError::UnregisteredDependency`] if nothing is
    /// registered under `key`, with [`ResolveError::TypeMismatch`] if it is
    /// registered with a type other than `T`, or with whatever error the
    /// construction of the object or one of its dependencies raised.
    pub async fn resolve<T: Service>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, ResolveError> {
        let key = key.into();
        let registration = self.core.registration(&key)?;
        self.get(&registration).await
    }

    /// Same as [`Resolver::resolve`]. A missing registration is always an
    /// error, so both methods behave identically.
    pub async fn resolve_required<T: Service>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, ResolveError> {
        self.resolve(key).await
    }

    /// Resolves every registration of `token`, in registration order. The
    /// lifetimes are probed in priority order and only the first one holding
    /// `token` is used.
    pub async fn resolve_all<T: Service>(&self, token: &Token) -> Result<Vec<Arc<T>>, ResolveError> {
        let registrations = self.core.registrations_by_token(token);
        self.get_all(&registrations).await
    }

    /// Like [`Resolver::resolve_all`], but fails with
    /// [`ResolveError::UnregisteredDependency`] if nothing is registered.
    pub async fn resolve_all_required<T: Service>(
        &self,
        token: &Token,
    ) -> Result<Vec<Arc<T>>, ResolveError> {
        let objects = self.resolve_all(token).await?;
        if objects.is_empty() {
            Err(ResolveError::UnregisteredDependency { key: token.into() })
        } else {
            Ok(objects)
        }
    }

    /// Resolves the first registration of type `T` tagged `tag`, across all
    /// tokens and lifetimes.
    pub async fn resolve_tagged<T: Service>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Option<Arc<T>>, ResolveError> {
        let tag = tag.into();
        match self.tagged::<T>(&tag).first() {
            Some(registration) => self.get(registration).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn resolve_tagged_required<T: Service>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Arc<T>, ResolveError> {
        let tag = tag.into();
        match self.resolve_tagged(tag.clone()).await? {
            Some(object) => Ok(object),
            None => Err(ResolveError::UnregisteredTag { tag }),
        }
    }

    /// Resolves every registration of type `T` tagged `tag`.
    pub async fn resolve_all_tagged<T: Service>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Vec<Arc<T>>, ResolveError> {
        let registrations = self.tagged::<T>(&tag.into());
        self.get_all(&registrations).await
    }

    pub async fn resolve_all_tagged_required<T: Service>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Vec<Arc<T>>, ResolveError> {
        let tag = tag.into();
        let objects = self.resolve_all_tagged(tag.clone()).await?;
        if objects.is_empty() {
            Err(ResolveError::UnregisteredTag { tag })
        } else {
            Ok(objects)
        }
    }

    /// Disposes the scoped objects of the active request scope, if any, then
    /// every singleton.
    pub async fn dispose(&self) -> Result<(), DisposeError> {
        self.core.dispose().await
    }

    pub async fn dispose_singletons(&self) -> Result<(), DisposeError> {
        self.core.dispose_singletons().await
    }

    pub async fn dispose_scoped_services(&self) -> Result<(), DisposeError> {
        self.core.dispose_scoped_services().await
    }

    /// Runs `future` inside a new request scope, then disposes every scoped
    /// object created in it.
    ///
    /// The scope is visible to everything `future` awaits. Work spawned onto
    /// other tasks must be wrapped with [`crate::scope::inherit`]. If `future`
    /// panics, the scoped objects are still disposed before the panic
    /// resumes.
    ///
    /// # Errors
    ///
    /// Returns [`DisposalFailed`], which still carries the output of
    /// `future`, if a dispose hook fails.
    pub async fn run_with_new_request_scope<F>(
        &self,
        store: Option<ScopeStore>,
        future: F,
    ) -> Result<F::Output, DisposalFailed<F::Output>>
    where
        F: Future,
    {
        self.core
            .run_in_request_scope(store.unwrap_or_default(), future)
            .await
    }

    pub fn is_in_request_scope_context(&self) -> bool {
        RequestScope::is_active()
    }

    pub fn discovery(&self) -> DiscoveryService {
        DiscoveryService::new(Arc::clone(self.core.services()))
    }

    fn tagged<T: Service>(&self, tag: &Tag) -> Vec<Arc<Registration>> {
        self.core
            .registrations_by_tag(tag)
            .into_iter()
            .filter(|r| r.output().is::<T>())
            .collect()
    }

    async fn get_all<T: Service>(
        &self,
        registrations: &[Arc<Registration>],
    ) -> Result<Vec<Arc<T>>, ResolveError> {
        let mut objects = Vec::with_capacity(registrations.len());
        for registration in registrations {
            objects.push(self.get(registration).await?);
        }
        Ok(objects)
    }

    async fn get<T: Service>(&self, registration: &Registration) -> Result<Arc<T>, ResolveError> {
        let output = registration.output();
        if !output.is::<T>() {
            return Err(ResolveError::TypeMismatch {
                key: registration.key().clone(),
                expected: any::type_name::<T>(),
                actual: output.name(),
            });
        }

        let object = self.core.get(registration).await?;
        object
            .downcast::<T>()
            .ok_or_else(|| ResolveError::TypeMismatch {
                key: registration.key().clone(),
                expected: any::type_name::<T>(),
                actual: object.type_name(),
            })
    }
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Resolver")
            .field("in_request_scope", &self.is_in_request_scope_context())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::container::registry::SingletonOptions;
    use crate::service::BoxError;

    use super::*;

    const PORT: Token = Token::named("port");
    const HANDLER: Token = Token::named("handler");
    const REQUEST: Token = Token::named("request");

    struct TestModule {
        constructed: Arc<AtomicUsize>,
    }

    impl Module for TestModule {
        fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
            let constructed = Arc::clone(&self.constructed);
            configurer
                .add_singleton(
                    &PORT,
                    move |_| {
                        constructed.fetch_add(1, Ordering::SeqCst);
                        async { Ok(8080u16) }
                    },
                    SingletonOptions::eager(),
                )?
                .add_transient(HANDLER.tagged("Http"), |resolver: Resolver| async move {
                    let port = resolver.resolve::<u16>(&PORT).await?;
                    Ok(format!("http:{port}"))
                })?
                .add_transient(HANDLER.tagged("grpc"), |_| async {
                    Ok(String::from("grpc"))
                })?
                .add_scoped(&REQUEST, |_| async {
                    Ok(RequestScope::current_store()
                        .and_then(|store| store.get::<u64>("id"))
                        .map_or(0, |id| *id))
                })?;
            Ok(())
        }
    }

    fn container() -> (Container, Arc<AtomicUsize>) {
        let constructed = Arc::new(AtomicUsize::new(0));
        let container = Container::init(TestModule {
            constructed: Arc::clone(&constructed),
        })
        .unwrap();
        (container, constructed)
    }

    #[tokio::test]
    async fn container_build_succeeds_with_eager_singletons() {
        let (container, constructed) = container();
        assert_eq!(constructed.load(Ordering::SeqCst), 0);

        let resolver = container.build(BuildOptions::default()).await.unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);

        let port = resolver.resolve::<u16>(&PORT).await.unwrap();
        assert_eq!(*port, 8080);
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn container_build_succeeds_without_auto_init() {
        let (container, constructed) = container();
        let resolver = container
            .build(BuildOptions::without_auto_init())
            .await
            .unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 0);

        resolver.resolve_required::<u16>(&PORT).await.unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolver_resolve_fails_when_type_differs() {
        let (container, constructed) = container();
        let resolver = container.resolver();

        assert!(matches!(
            resolver.resolve::<u32>(&PORT).await,
            Err(ResolveError::TypeMismatch { .. })
        ));
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolver_resolve_fails_when_unregistered() {
        let resolver = Container::new().resolver();
        assert!(matches!(
            resolver.resolve::<u16>(&PORT).await,
            Err(ResolveError::UnregisteredDependency { .. })
        ));
        assert!(resolver.resolve_all::<u16>(&PORT).await.unwrap().is_empty());
        assert!(matches!(
            resolver.resolve_all_required::<u16>(&PORT).await,
            Err(ResolveError::UnregisteredDependency { .. })
        ));
    }

    #[tokio::test]
    async fn resolver_resolve_all_succeeds() {
        let (container, _) = container();
        let resolver = container.resolver();

        let handlers = resolver.resolve_all::<String>(&HANDLER).await.unwrap();
        let handlers: Vec<_> = handlers.iter().map(|h| h.as_str()).collect();
        assert_eq!(handlers, ["http:8080", "grpc"]);
    }

    #[tokio::test]
    async fn resolver_resolve_tagged_succeeds() {
        let (container, _) = container();
        let resolver = container.resolver();

        let http = resolver.resolve_tagged::<String>("HTTP").await.unwrap();
        assert_eq!(http.as_deref().map(String::as_str), Some("http:8080"));
        assert!(resolver.resolve_tagged::<u16>("http").await.unwrap().is_none());

        let default = resolver.resolve_all_tagged::<u16>(Tag::DEFAULT).await.unwrap();
        assert_eq!(default.len(), 1);

        assert!(matches!(
            resolver.resolve_tagged_required::<String>("missing").await,
            Err(ResolveError::UnregisteredTag { .. })
        ));
        assert!(matches!(
            resolver.resolve_all_tagged_required::<String>("missing").await,
            Err(ResolveError::UnregisteredTag { .. })
        ));
    }

    #[tokio::test]
    async fn resolver_run_with_new_request_scope_succeeds() {
        let (container, _) = container();
        let resolver = container.resolver();
        assert!(!resolver.is_in_request_scope_context());

        let store = ScopeStore::new().with_value("id", 7u64);
        let id = resolver
            .run_with_new_request_scope(Some(store), async {
                assert!(resolver.is_in_request_scope_context());
                *resolver.resolve::<u64>(&REQUEST).await.unwrap()
            })
            .await
            .unwrap();
        assert_eq!(id, 7);

        assert!(matches!(
            resolver.resolve::<u64>(&REQUEST).await,
            Err(ResolveError::RequestScopeResolution { .. })
        ));
    }

    #[tokio::test]
    async fn container_registration_stays_open_after_build() {
        let (mut container, _) = container();
        let resolver = container.build(BuildOptions::default()).await.unwrap();

        container.add_instance(Token::of::<u8>(), 3u8).unwrap();
        let value = resolver.resolve::<u8>(Token::of::<u8>()).await.unwrap();
        assert_eq!(*value, 3);
    }
}
