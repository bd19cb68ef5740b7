use std::collections::HashMap;
use std::sync::Arc;

use crate::container::registry::{Registration, RegistryError};
use crate::provider::Provider;
use crate::scope::Lifetime;
use crate::token::{ServiceKey, Tag, Token};

/// The registrations of a container, one map per lifetime.
///
/// Within a map, each token owns the list of its registrations, one per tag.
/// A token lives in at most one map. Replaced singleton registrations are
/// retired rather than dropped, as they may still hold an instance which has
/// to be disposed.
#[derive(Debug, Default)]
pub struct ServiceMap {
    maps: [HashMap<Token, Vec<Arc<Registration>>>; 3],
    retired: Vec<Arc<Registration>>,
    next_seq: u64,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration and returns the one it replaces, if any.
    pub fn insert(
        &mut self,
        key: ServiceKey,
        lifetime: Lifetime,
        provider: Box<dyn Provider>,
        eager: bool,
    ) -> Result<Option<Arc<Registration>>, RegistryError> {
        if let Some(existing) = self.lifetime_of(key.token()) {
            if existing != lifetime {
                return Err(RegistryError::CrossLifecycleRegistration {
                    token: key.token().clone(),
                    existing,
                    requested: lifetime,
                });
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let token = key.token().clone();
        let registration = Arc::new(Registration::new(key, lifetime, provider, eager, seq));
        let entries = self.maps[index(lifetime)].entry(token).or_default();

        let replaced = entries
            .iter()
            .position(|r| r.tag() == registration.tag())
            .map(|pos| entries.remove(pos));
        entries.push(registration);

        if let Some(old) = replaced.as_ref().filter(|r| r.lifetime() == Lifetime::Singleton) {
            self.retired.push(Arc::clone(old));
        }
        Ok(replaced)
    }

    /// Drains the singleton registrations replaced since the last call.
    pub fn take_retired(&mut self) -> Vec<Arc<Registration>> {
        std::mem::take(&mut self.retired)
    }

    /// Finds the registration of `key`, probing singletons, then scoped, then
    /// transient registrations.
    pub fn find(&self, key: &ServiceKey) -> Option<Arc<Registration>> {
        Lifetime::ALL.into_iter().find_map(|lifetime| {
            self.map(lifetime)
                .get(key.token())?
                .iter()
                .find(|r| r.tag() == key.tag())
                .cloned()
        })
    }

    /// Returns every registration of `token` in registration order.
    pub fn by_token(&self, token: &Token) -> Vec<Arc<Registration>> {
        Lifetime::ALL
            .into_iter()
            .filter_map(|lifetime| self.map(lifetime).get(token))
            .find(|entries| !entries.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    pub fn by_tag(&self, tag: &Tag) -> Vec<Arc<Registration>> {
        self.collect(|r| r.tag() == tag)
    }

    pub fn by_lifetime(&self, lifetime: Lifetime) -> Vec<Arc<Registration>> {
        let mut registrations: Vec<_> = self.map(lifetime).values().flatten().cloned().collect();
        registrations.sort_by_key(|r| r.seq());
        registrations
    }

    pub fn all(&self) -> Vec<Arc<Registration>> {
        self.collect(|_| true)
    }

    fn lifetime_of(&self, token: &Token) -> Option<Lifetime> {
        Lifetime::ALL
            .into_iter()
            .find(|&lifetime| self.map(lifetime).contains_key(token))
    }

    fn map(&self, lifetime: Lifetime) -> &HashMap<Token, Vec<Arc<Registration>>> {
        &self.maps[index(lifetime)]
    }

    fn collect<P>(&self, predicate: P) -> Vec<Arc<Registration>>
    where
        P: Fn(&Registration) -> bool,
    {
        Lifetime::ALL
            .into_iter()
            .flat_map(|lifetime| self.by_lifetime(lifetime))
            .filter(|r| predicate(&**r))
            .collect()
    }
}

fn index(lifetime: Lifetime) -> usize {
    match lifetime {
        Lifetime::Singleton => 0,
        Lifetime::Scoped => 1,
        Lifetime::Transient => 2,
    }
}

#[cfg(test)]
mod tests {
    use crate::provider::InstanceProvider;

    use super::*;

    const NUMBER: Token = Token::named("number");
    const NAME: Token = Token::named("name");

    fn insert(
        map: &mut ServiceMap,
        key: ServiceKey,
        lifetime: Lifetime,
        value: u32,
    ) -> Result<Option<Arc<Registration>>, RegistryError> {
        map.insert(key, lifetime, Box::new(InstanceProvider::new(value)), false)
    }

    #[test]
    fn service_map_insert_succeeds_when_replacing() {
        let mut map = ServiceMap::new();
        assert!(insert(&mut map, NUMBER.tagged("a"), Lifetime::Scoped, 1)
            .unwrap()
            .is_none());
        assert!(insert(&mut map, NUMBER.tagged("b"), Lifetime::Scoped, 2)
            .unwrap()
            .is_none());

        let replaced = insert(&mut map, NUMBER.tagged("A"), Lifetime::Scoped, 3).unwrap();
        assert_eq!(replaced.unwrap().tag().as_str(), "a");

        let tags: Vec<_> = map
            .by_token(&NUMBER)
            .iter()
            .map(|r| r.tag().as_str().to_owned())
            .collect();
        assert_eq!(tags, ["b", "a"]);
        assert!(map.take_retired().is_empty());
    }

    #[test]
    fn service_map_insert_retires_replaced_singletons() {
        let mut map = ServiceMap::new();
        insert(&mut map, NAME.into(), Lifetime::Singleton, 1).unwrap();
        let old = map.find(&NAME.into()).unwrap();

        insert(&mut map, NAME.into(), Lifetime::Singleton, 2).unwrap();
        let retired = map.take_retired();
        assert_eq!(retired.len(), 1);
        assert!(Arc::ptr_eq(&retired[0], &old));
        assert!(map.take_retired().is_empty());
        assert_eq!(map.by_lifetime(Lifetime::Singleton).len(), 1);
    }

    #[test]
    fn service_map_insert_fails_when_lifetime_differs() {
        let mut map = ServiceMap::new();
        insert(&mut map, NUMBER.into(), Lifetime::Transient, 1).unwrap();

        let err = insert(&mut map, NUMBER.tagged("other"), Lifetime::Singleton, 2).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::CrossLifecycleRegistration {
                existing: Lifetime::Transient,
                requested: Lifetime::Singleton,
                ..
            }
        ));
        assert_eq!(map.by_token(&NUMBER).len(), 1);
    }

    #[test]
    fn service_map_lookups_succeed() {
        let mut map = ServiceMap::new();
        insert(&mut map, NUMBER.tagged("primary"), Lifetime::Transient, 1).unwrap();
        insert(&mut map, NAME.tagged("primary"), Lifetime::Singleton, 2).unwrap();
        insert(&mut map, NAME.into(), Lifetime::Singleton, 3).unwrap();

        assert!(map.find(&NAME.into()).is_some());
        assert!(map.find(&NUMBER.into()).is_none());
        assert!(map.find(&Token::named("missing").into()).is_none());

        let tagged = map.by_tag(&Tag::new("PRIMARY"));
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[0].lifetime(), Lifetime::Singleton);
        assert_eq!(tagged[1].lifetime(), Lifetime::Transient);

        assert_eq!(map.by_lifetime(Lifetime::Singleton).len(), 2);
        assert!(map.by_lifetime(Lifetime::Scoped).is_empty());
        assert_eq!(map.all().len(), 3);
        assert!(map.by_token(&Token::named("missing")).is_empty());
    }
}
