use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use crate::scope::Lifetime;
use crate::token::{ServiceKey, Token};

tokio::task_local! {
    static CHAIN: ResolutionChain;
}

/// One in-flight construction: the registration being built and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    key: ServiceKey,
    lifetime: Lifetime,
}

impl Link {
    pub fn new(key: ServiceKey, lifetime: Lifetime) -> Self {
        Self { key, lifetime }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }
}

/// The constructions in flight above the current point of one root
/// resolution.
///
/// Every factory runs with a chain extended by its own link, bound to the
/// task-local context, so a nested resolution made by the factory (directly or
/// across awaits) sees all of its ancestors. The chain is persistent: siblings
/// share their common prefix but never see each other's links, so resolving
/// the same transient twice side by side is not mistaken for a cycle.
#[derive(Clone, Default)]
pub struct ResolutionChain {
    head: Option<Arc<ChainNode>>,
}

struct ChainNode {
    link: Link,
    previous: Option<Arc<ChainNode>>,
}

impl ResolutionChain {
    /// Returns the chain bound to the current task, or an empty chain if this
    /// is a root resolution.
    pub fn current() -> Self {
        CHAIN.try_with(Self::clone).unwrap_or_default()
    }

    pub fn append(&self, link: Link) -> Self {
        Self {
            head: Some(Arc::new(ChainNode {
                link,
                previous: self.head.clone(),
            })),
        }
    }

    pub fn contains(&self, link: &Link) -> bool {
        self.iter().any(|l| l == link)
    }

    /// Returns the tokens from the first occurrence of `link` through the
    /// current point, with `link`'s token appended once more to close the
    /// cycle.
    pub fn cycle_through(&self, link: &Link) -> Vec<Token> {
        let mut links: Vec<&Link> = self.iter().collect();
        links.reverse();

        let start = links.iter().position(|l| *l == link).unwrap_or(0);
        links[start..]
            .iter()
            .map(|l| l.key().token().clone())
            .chain([link.key().token().clone()])
            .collect()
    }

    /// Runs `future` with `self` as the ambient chain.
    pub fn scope<F: Future>(self, future: F) -> impl Future<Output = F::Output> {
        CHAIN.scope(self, future)
    }

    fn iter(&self) -> impl Iterator<Item = &Link> {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let current = node?;
            node = current.previous.as_deref();
            Some(&current.link)
        })
    }
}

impl Debug for ResolutionChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut links: Vec<&Link> = self.iter().collect();
        links.reverse();
        f.debug_list().entries(links).finish()
    }
}
