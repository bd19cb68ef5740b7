use std::fmt::{Debug, Formatter, Result as FmtResult};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::container::resolver::Link;
use crate::provider::Provider;
use crate::scope::{Lifetime, RequestScope};
use crate::service::{Instance, OutputType};
use crate::token::{ServiceKey, Tag};

/// One registered recipe: a key, a lifetime, a provider and the storage for
/// the instance it produces.
pub struct Registration {
    key: ServiceKey,
    lifetime: Lifetime,
    provider: Box<dyn Provider>,
    output: OutputType,
    eager: bool,
    seq: u64,
    lock: AsyncMutex<()>,
    slot: InstanceSlot,
}

impl Registration {
    pub fn new(
        key: ServiceKey,
        lifetime: Lifetime,
        provider: Box<dyn Provider>,
        eager: bool,
        seq: u64,
    ) -> Self {
        let output = provider.output();
        Self {
            key,
            lifetime,
            provider,
            output,
            eager: eager && lifetime == Lifetime::Singleton,
            seq,
            lock: AsyncMutex::new(()),
            slot: InstanceSlot::for_lifetime(lifetime),
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn tag(&self) -> &Tag {
        self.key.tag()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn output(&self) -> OutputType {
        self.output
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn link(&self) -> Link {
        Link::new(self.key.clone(), self.lifetime)
    }

    /// Acquires the single-flight lock of this registration. It serializes
    /// construction and disposal of the instance.
    pub async fn lock(&self) -> AsyncMutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub fn is_resolved(&self) -> bool {
        self.instance().is_some()
    }

    /// Returns the cached instance. For scoped registrations, the answer
    /// depends on which request scope is asking.
    pub fn instance(&self) -> Option<Instance> {
        self.slot.get(&self.key, self.seq)
    }

    pub fn set_instance(&self, instance: Instance) {
        self.slot.set(&self.key, self.seq, instance);
    }

    pub fn take_instance(&self) -> Option<Instance> {
        self.slot.take(&self.key, self.seq)
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("output", &self.output.name())
            .field("eager", &self.eager)
            .finish_non_exhaustive()
    }
}

enum InstanceSlot {
    Local(Mutex<Option<Instance>>),
    Scoped,
    Uncached,
}

impl InstanceSlot {
    fn for_lifetime(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Singleton => Self::Local(Mutex::new(None)),
            Lifetime::Scoped => Self::Scoped,
            Lifetime::Transient => Self::Uncached,
        }
    }

    fn get(&self, key: &ServiceKey, seq: u64) -> Option<Instance> {
        match self {
            Self::Local(slot) => slot.lock().clone(),
            Self::Scoped => RequestScope::current_store()?.instance(key, seq),
            Self::Uncached => None,
        }
    }

    fn set(&self, key: &ServiceKey, seq: u64, instance: Instance) {
        match self {
            Self::Local(slot) => *slot.lock() = Some(instance),
            Self::Scoped => {
                if let Some(store) = RequestScope::current_store() {
                    store.set_instance(key.clone(), seq, instance);
                }
            }
            Self::Uncached => {}
        }
    }

    fn take(&self, key: &ServiceKey, seq: u64) -> Option<Instance> {
        match self {
            Self::Local(slot) => slot.lock().take(),
            Self::Scoped => RequestScope::current_store()?.take_instance(key, seq),
            Self::Uncached => None,
        }
    }
}
