use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::registry::{Registration, ServiceMap};
use crate::scope::Lifetime;
use crate::token::{ServiceKey, Tag, Token};

/// Metadata of one registration, as seen by a [`DiscoveryService`] query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    key: ServiceKey,
    lifetime: Lifetime,
    output: &'static str,
    eager: bool,
}

impl ServiceDescriptor {
    fn from_registration(registration: &Registration) -> Self {
        Self {
            key: registration.key().clone(),
            lifetime: registration.lifetime(),
            output: registration.output().name(),
            eager: registration.is_eager(),
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn token(&self) -> &Token {
        self.key.token()
    }

    pub fn tag(&self) -> &Tag {
        self.key.tag()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The type name of the objects the registration produces.
    pub fn output_type(&self) -> &'static str {
        self.output
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }
}

/// Read-only queries over the registrations of a container.
///
/// Every query reads the registry at call time, so registrations added after
/// a query show up in the next one.
#[derive(Clone)]
pub struct DiscoveryService {
    services: Arc<RwLock<ServiceMap>>,
}

impl DiscoveryService {
    pub(crate) fn new(services: Arc<RwLock<ServiceMap>>) -> Self {
        Self { services }
    }

    /// Returns every registration, singletons first, then scoped, then
    /// transient ones.
    pub fn get_all(&self) -> Vec<ServiceDescriptor> {
        describe(self.services.read().all())
    }

    /// Tags are compared after lowercasing, like everywhere else.
    pub fn get_services_by_tag(&self, tag: impl Into<Tag>) -> Vec<ServiceDescriptor> {
        describe(self.services.read().by_tag(&tag.into()))
    }

    pub fn get_services_by_service_token(&self, token: &Token) -> Vec<ServiceDescriptor> {
        describe(self.services.read().by_token(token))
    }

    pub fn get_services_by_lifetime(&self, lifetime: Lifetime) -> Vec<ServiceDescriptor> {
        describe(self.services.read().by_lifetime(lifetime))
    }
}

impl Debug for DiscoveryService {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DiscoveryService").finish_non_exhaustive()
    }
}

fn describe(registrations: Vec<Arc<Registration>>) -> Vec<ServiceDescriptor> {
    registrations
        .iter()
        .map(|r| ServiceDescriptor::from_registration(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::container::registry::{SingletonOptions, TypedConfigurer};
    use crate::container::Container;
    use crate::provider::MockProvider;
    use crate::service::OutputType;

    use super::*;

    const CACHE: Token = Token::named("cache");
    const QUEUE: Token = Token::named("queue");

    fn mock_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider
            .expect_output()
            .return_const(OutputType::of::<String>());
        provider.expect_dyn_provide().never();
        provider
    }

    #[test]
    fn discovery_service_queries_succeed() {
        let mut container = Container::new();
        container
            .add_provider(
                CACHE.tagged("Redis"),
                Lifetime::Singleton,
                mock_provider(),
                SingletonOptions::eager(),
            )
            .unwrap()
            .add_provider(
                CACHE.tagged("memory"),
                Lifetime::Singleton,
                mock_provider(),
                SingletonOptions::lazy(),
            )
            .unwrap()
            .add_provider(
                QUEUE.tagged("redis"),
                Lifetime::Transient,
                mock_provider(),
                SingletonOptions::eager(),
            )
            .unwrap();

        let discovery = container.discovery();
        assert_eq!(discovery.get_all().len(), 3);

        let redis = discovery.get_services_by_tag("REDIS");
        assert_eq!(redis.len(), 2);
        assert_eq!(redis[0].token(), &CACHE);
        assert!(redis[0].is_eager());
        assert_eq!(redis[0].output_type(), "alloc::string::String");
        assert_eq!(redis[1].token(), &QUEUE);
        assert!(!redis[1].is_eager());

        let caches = discovery.get_services_by_service_token(&CACHE);
        let tags: Vec<_> = caches.iter().map(|d| d.tag().as_str()).collect();
        assert_eq!(tags, ["redis", "memory"]);

        assert_eq!(discovery.get_services_by_lifetime(Lifetime::Transient).len(), 1);
        assert!(discovery.get_services_by_lifetime(Lifetime::Scoped).is_empty());
    }

    #[test]
    fn discovery_service_sees_later_registrations() {
        let mut container = Container::new();
        let discovery = container.discovery();
        assert!(discovery.get_all().is_empty());

        container.add_instance(&QUEUE, 1u8).unwrap();
        assert_eq!(discovery.get_all().len(), 1);
        assert_eq!(discovery.get_all()[0].lifetime(), Lifetime::Singleton);
    }
}
