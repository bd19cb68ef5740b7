use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::resolver::ResolutionChain;
use crate::service::Instance;
use crate::token::ServiceKey;

/// How long an object created by a container lives.
///
/// - [`Lifetime::Singleton`]: one instance for the whole container, created
///   on first resolution (or during `build` if it is eager) and cached until
///   singletons are disposed.
/// - [`Lifetime::Scoped`]: one instance per request scope, cached in the
///   scope's [`ScopeStore`] and disposed when the scope exits.
/// - [`Lifetime::Transient`]: a fresh instance on every resolution, never
///   cached and never disposed by the container.
///
/// The declaration order is also the lookup priority: when a token is
/// resolved, the singleton registrations are probed first, then the scoped
/// ones, then the transient ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

impl Lifetime {
    /// All lifetimes in lookup priority order.
    pub const ALL: [Lifetime; 3] = [Self::Singleton, Self::Scoped, Self::Transient];

    pub fn to_str(self) -> &'static str {
        match self {
            Self::Singleton => "Singleton",
            Self::Scoped => "Scoped",
            Self::Transient => "Transient",
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.to_str())
    }
}

tokio::task_local! {
    static REQUEST_SCOPE: ScopeStore;
}

/// The key-value store bound to one request scope.
///
/// Besides the scoped service instances the container caches in it, a store
/// carries arbitrary caller-supplied values (a request id, the authenticated
/// user, ...) which application code can read back through
/// [`RequestScope::current_store`]. Cloning a store yields another handle to
/// the same data.
#[derive(Clone, Default)]
pub struct ScopeStore {
    data: Arc<Mutex<StoreData>>,
}

/// Scoped instances are keyed by the registration that built them, so
/// replacing a registration inside an open scope never serves the old
/// instance.
type InstanceId = (ServiceKey, u64);

#[derive(Default)]
struct StoreData {
    services: HashMap<InstanceId, Instance>,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value<T>(self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.insert(key, value);
        self
    }

    pub fn insert<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.data.lock().values.insert(key.into(), Arc::new(value));
    }

    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.data.lock().values.get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.data.lock().values.remove(key).is_some()
    }

    /// Returns the number of scoped service instances currently cached.
    pub fn cached_services(&self) -> usize {
        self.data.lock().services.len()
    }

    pub(crate) fn instance(&self, key: &ServiceKey, seq: u64) -> Option<Instance> {
        self.data.lock().services.get(&(key.clone(), seq)).cloned()
    }

    pub(crate) fn set_instance(&self, key: ServiceKey, seq: u64, instance: Instance) {
        self.data.lock().services.insert((key, seq), instance);
    }

    pub(crate) fn take_instance(&self, key: &ServiceKey, seq: u64) -> Option<Instance> {
        self.data.lock().services.remove(&(key.clone(), seq))
    }

    /// Removes and returns the instances for which `detached` holds.
    pub(crate) fn take_instances_where<P>(&self, detached: P) -> Vec<(ServiceKey, Instance)>
    where
        P: Fn(&ServiceKey, u64) -> bool,
    {
        let mut data = self.data.lock();
        let ids: Vec<InstanceId> = data
            .services
            .keys()
            .filter(|(key, seq)| detached(key, *seq))
            .cloned()
            .collect();
        ids.into_iter()
            .filter_map(|id| {
                let instance = data.services.remove(&id)?;
                Some((id.0, instance))
            })
            .collect()
    }
}

impl Debug for ScopeStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let data = self.data.lock();
        f.debug_struct("ScopeStore")
            .field(
                "services",
                &data.services.keys().map(|(key, _)| key).collect::<Vec<_>>(),
            )
            .field("values", &data.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Access to the request scope bound to the current task.
///
/// A scope is entered with `Resolver::run_with_new_request_scope`. Its store
/// is visible to every future awaited inside the callback and invisible to
/// sibling tasks and to code running after the callback returns.
pub struct RequestScope;

impl RequestScope {
    pub fn is_active() -> bool {
        REQUEST_SCOPE.try_with(|_| ()).is_ok()
    }

    pub fn current_store() -> Option<ScopeStore> {
        REQUEST_SCOPE.try_with(ScopeStore::clone).ok()
    }

    pub(crate) async fn enter<F: Future>(store: ScopeStore, future: F) -> F::Output {
        REQUEST_SCOPE.scope(store, future).await
    }
}

/// Carries the ambient request scope and resolution chain of the calling task
/// over to `future`.
///
/// Tokio task-locals are not inherited by spawned tasks, so work handed to
/// `tokio::spawn` from inside a scope or a factory has to be wrapped:
///
/// ```rust,no_run
/// # async fn demo() {
/// let handle = tokio::spawn(ambit::scope::inherit(async {
///     assert!(ambit::scope::RequestScope::is_active());
/// }));
/// # }
/// ```
pub fn inherit<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let store = RequestScope::current_store();
    let chain = ResolutionChain::current();
    async move {
        let future = chain.scope(future);
        match store {
            Some(store) => RequestScope::enter(store, future).await,
            None => future.await,
        }
    }
}
