mod chain;

use std::fmt::{Display, Formatter, Result as FmtResult};

use snafu::prelude::*;

use crate::service::BoxError;
use crate::token::{ServiceKey, Tag, Token};

pub use chain::{Link, ResolutionChain};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ResolveError {
    #[snafu(display("could not find any registration for {key}"))]
    #[non_exhaustive]
    UnregisteredDependency { key: ServiceKey },
    #[snafu(display("could not find any registration tagged {tag}"))]
    #[non_exhaustive]
    UnregisteredTag { tag: Tag },
    #[snafu(display(
        "could not construct the object {key} which depends on itself: {}",
        ChainDisplayer::new(chain)
    ))]
    #[non_exhaustive]
    CircularDependency { key: ServiceKey, chain: Vec<Token> },
    #[snafu(display(
        "could not resolve the scoped object {key} outside of a request scope \
         (a singleton or transient factory may be pulling in a scoped dependency)"
    ))]
    #[non_exhaustive]
    RequestScopeResolution { key: ServiceKey },
    #[snafu(display("could not resolve {key} as {expected} since it is registered as {actual}"))]
    #[non_exhaustive]
    TypeMismatch {
        key: ServiceKey,
        expected: &'static str,
        actual: &'static str,
    },
    #[snafu(display("could not construct the object {key}"))]
    #[non_exhaustive]
    Construction { key: ServiceKey, source: BoxError },
}

impl ResolveError {
    /// Wraps a factory or hook failure. A [`ResolveError`] raised by a nested
    /// resolution inside the factory is passed through unchanged, so the root
    /// caller sees the original kind.
    pub(crate) fn from_factory(key: &ServiceKey, err: BoxError) -> Self {
        match err.downcast::<ResolveError>() {
            Ok(err) => *err,
            Err(source) => Self::Construction {
                key: key.clone(),
                source,
            },
        }
    }
}

struct ChainDisplayer<'a> {
    chain: &'a [Token],
}

impl<'a> ChainDisplayer<'a> {
    fn new(chain: &'a [Token]) -> Self {
        Self { chain }
    }
}

impl Display for ChainDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, token) in self.chain.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}
