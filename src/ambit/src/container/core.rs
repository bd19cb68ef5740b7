use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::registry::{Registration, ServiceMap};
use crate::container::resolver::{Link, ResolutionChain, ResolveError};
use crate::container::Resolver;
use crate::scope::{Lifetime, RequestScope};
use crate::service::Instance;
use crate::token::{ServiceKey, Tag, Token};

/// The resolution engine shared by a container and all of its resolvers.
///
/// Cached lifetimes follow one protocol: look for a cached instance, check the
/// ambient resolution chain for a cycle, take the registration's lock, look
/// again, and only then run the factory. The second look is what makes
/// concurrent first resolutions of the same registration share one factory
/// call.
pub struct ContainerCore {
    services: Arc<RwLock<ServiceMap>>,
}

impl ContainerCore {
    pub fn new(services: Arc<RwLock<ServiceMap>>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<RwLock<ServiceMap>> {
        &self.services
    }

    pub fn registration(&self, key: &ServiceKey) -> Result<Arc<Registration>, ResolveError> {
        self.services
            .read()
            .find(key)
            .ok_or_else(|| ResolveError::UnregisteredDependency { key: key.clone() })
    }

    pub fn registrations_by_token(&self, token: &Token) -> Vec<Arc<Registration>> {
        self.services.read().by_token(token)
    }

    pub fn registrations_by_tag(&self, tag: &Tag) -> Vec<Arc<Registration>> {
        self.services.read().by_tag(tag)
    }

    pub fn registrations_by_lifetime(&self, lifetime: Lifetime) -> Vec<Arc<Registration>> {
        self.services.read().by_lifetime(lifetime)
    }

    pub async fn get(
        self: &Arc<Self>,
        registration: &Registration,
    ) -> Result<Instance, ResolveError> {
        match registration.lifetime() {
            Lifetime::Singleton => self.get_shared_object(registration).await,
            Lifetime::Scoped if !RequestScope::is_active() => {
                Err(ResolveError::RequestScopeResolution {
                    key: registration.key().clone(),
                })
            }
            Lifetime::Scoped => self.get_shared_object(registration).await,
            Lifetime::Transient => self.get_transient_object(registration).await,
        }
    }

    /// Resolves every eager singleton, in registration order.
    pub async fn init_eager_singletons(self: &Arc<Self>) -> Result<(), ResolveError> {
        let eager: Vec<_> = self
            .registrations_by_lifetime(Lifetime::Singleton)
            .into_iter()
            .filter(|r| r.is_eager())
            .collect();

        tracing::debug!(count = eager.len(), "constructing eager singletons");
        for registration in eager {
            self.get(&registration).await?;
        }
        Ok(())
    }

    async fn get_shared_object(
        self: &Arc<Self>,
        registration: &Registration,
    ) -> Result<Instance, ResolveError> {
        if let Some(object) = registration.instance() {
            tracing::trace!(key = %registration.key(), "reused cached object");
            return Ok(object);
        }

        let chain = ResolutionChain::current();
        let link = registration.link();
        if chain.contains(&link) {
            return Err(Self::stop_on_cyclic_dependency(&chain, &link));
        }

        let _guard = registration.lock().await;
        if let Some(object) = registration.instance() {
            tracing::trace!(key = %registration.key(), "reused object constructed concurrently");
            return Ok(object);
        }

        let object = self.construct_object(registration, chain.append(link)).await?;
        registration.set_instance(object.clone());
        Ok(object)
    }

    async fn get_transient_object(
        self: &Arc<Self>,
        registration: &Registration,
    ) -> Result<Instance, ResolveError> {
        let chain = ResolutionChain::current();
        let link = registration.link();
        if chain.contains(&link) {
            return Err(Self::stop_on_cyclic_dependency(&chain, &link));
        }

        self.construct_object(registration, chain.append(link)).await
    }

    /// Runs the factory and the construct hook with `chain` as the ambient
    /// resolution chain.
    async fn construct_object(
        self: &Arc<Self>,
        registration: &Registration,
        chain: ResolutionChain,
    ) -> Result<Instance, ResolveError> {
        let key = registration.key();
        let resolver = Resolver::new(Arc::clone(self));

        chain
            .scope(async move {
                tracing::trace!(%key, lifetime = %registration.lifetime(), "invoking factory");
                let object = registration
                    .provider()
                    .dyn_provide(resolver)
                    .await
                    .map_err(|err| ResolveError::from_factory(key, err))?;
                object
                    .run_construct_hook()
                    .await
                    .map_err(|err| ResolveError::from_factory(key, err))?;
                Ok::<_, ResolveError>(object)
            })
            .await
    }

    fn stop_on_cyclic_dependency(chain: &ResolutionChain, link: &Link) -> ResolveError {
        let cycle = chain.cycle_through(link);
        tracing::debug!(key = %link.key(), ?cycle, "detected circular dependency");
        ResolveError::CircularDependency {
            key: link.key().clone(),
            chain: cycle,
        }
    }
}
