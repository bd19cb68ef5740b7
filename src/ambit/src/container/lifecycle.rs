use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future;
use futures::FutureExt;
use snafu::prelude::*;

use crate::container::core::ContainerCore;
use crate::container::registry::{AggregatedDisplayer, Registration};
use crate::scope::{Lifetime, RequestScope, ScopeStore};
use crate::service::{BoxError, Instance};
use crate::token::ServiceKey;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DisposeError {
    #[snafu(display("could not dispose the object {key}"))]
    #[non_exhaustive]
    Hook { key: ServiceKey, source: BoxError },
    #[snafu(display(
        "aggregated disposal errors:\n{}",
        AggregatedDisplayer::new(errors.as_slice())
    ))]
    #[non_exhaustive]
    Aggregated { errors: Vec<DisposeError> },
}

impl DisposeError {
    /// Folds the failures of one or more disposal passes. A single failure is
    /// kept as is.
    fn aggregate<I>(errors: I) -> Result<(), Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut errors: Vec<_> = errors
            .into_iter()
            .flat_map(|err| match err {
                Self::Aggregated { errors } => errors,
                err => vec![err],
            })
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Aggregated { errors }),
        }
    }

    /// Returns the number of failed dispose hooks.
    pub fn hook_failures(&self) -> usize {
        match self {
            Self::Hook { .. } => 1,
            Self::Aggregated { errors } => errors.iter().map(Self::hook_failures).sum(),
        }
    }
}

/// The request scope callback completed, but disposing its scoped services
/// failed. The callback's output is kept alongside the disposal error.
pub struct DisposalFailed<R> {
    output: R,
    error: DisposeError,
}

impl<R> DisposalFailed<R> {
    pub fn output(&self) -> &R {
        &self.output
    }

    pub fn error(&self) -> &DisposeError {
        &self.error
    }

    pub fn into_output(self) -> R {
        self.output
    }

    pub fn into_parts(self) -> (R, DisposeError) {
        (self.output, self.error)
    }
}

impl<R> Debug for DisposalFailed<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DisposalFailed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<R> Display for DisposalFailed<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("could not dispose the scoped services of a completed request scope")
    }
}

impl<R> Error for DisposalFailed<R> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl ContainerCore {
    /// Disposes every scoped object cached in the active request scope. Does
    /// nothing outside of a request scope.
    ///
    /// Objects built by a registration which has since been replaced are
    /// disposed as well.
    pub async fn dispose_scoped_services(&self) -> Result<(), DisposeError> {
        let Some(store) = RequestScope::current_store() else {
            tracing::debug!("skipped scoped disposal outside of a request scope");
            return Ok(());
        };

        let live = self.registrations_by_lifetime(Lifetime::Scoped);
        let detached = store.take_instances_where(|key, seq| {
            !live.iter().any(|r| r.seq() == seq && r.key() == key)
        });
        let resolved: Vec<_> = live.into_iter().filter(|r| r.is_resolved()).collect();

        tracing::debug!(
            count = resolved.len(),
            detached = detached.len(),
            "disposing scoped services"
        );
        let (resolved, detached) =
            future::join(Self::dispose_all(&resolved), Self::dispose_detached(detached)).await;
        DisposeError::aggregate(resolved.err().into_iter().chain(detached.err()))
    }

    /// Disposes every constructed singleton, including those whose
    /// registration has been replaced. A singleton resolved afterwards is
    /// constructed again.
    pub async fn dispose_singletons(&self) -> Result<(), DisposeError> {
        let retired = self.services().write().take_retired();
        let resolved: Vec<_> = self
            .registrations_by_lifetime(Lifetime::Singleton)
            .into_iter()
            .chain(retired)
            .filter(|r| r.is_resolved())
            .collect();

        tracing::debug!(count = resolved.len(), "disposing singletons");
        Self::dispose_all(&resolved).await
    }

    pub async fn dispose(&self) -> Result<(), DisposeError> {
        let scoped = self.dispose_scoped_services().await;
        let singletons = self.dispose_singletons().await;
        DisposeError::aggregate(scoped.err().into_iter().chain(singletons.err()))
    }

    /// Runs `future` inside a fresh request scope backed by `store`, then
    /// disposes the scoped objects it created, even if `future` panics.
    pub async fn run_in_request_scope<F>(
        &self,
        store: ScopeStore,
        future: F,
    ) -> Result<F::Output, DisposalFailed<F::Output>>
    where
        F: Future,
    {
        RequestScope::enter(store, async move {
            tracing::debug!("entered request scope");
            let output = AssertUnwindSafe(future).catch_unwind().await;
            let disposal = self.dispose_scoped_services().await;
            tracing::debug!("exited request scope");

            match (output, disposal) {
                (Ok(output), Ok(())) => Ok(output),
                (Ok(output), Err(error)) => Err(DisposalFailed { output, error }),
                (Err(payload), disposal) => {
                    if let Err(error) = disposal {
                        tracing::warn!(%error, "could not dispose a panicking request scope");
                    }
                    panic::resume_unwind(payload)
                }
            }
        })
        .await
    }

    async fn dispose_all(registrations: &[Arc<Registration>]) -> Result<(), DisposeError> {
        let results = future::join_all(
            registrations
                .iter()
                .map(|registration| Self::dispose_registration(registration)),
        )
        .await;
        DisposeError::aggregate(results.into_iter().filter_map(Result::err))
    }

    async fn dispose_detached(objects: Vec<(ServiceKey, Instance)>) -> Result<(), DisposeError> {
        let results = future::join_all(
            objects
                .iter()
                .map(|(key, object)| Self::dispose_object(key, object)),
        )
        .await;
        DisposeError::aggregate(results.into_iter().filter_map(Result::err))
    }

    /// Takes the instance out of its slot first, so a failing hook still
    /// leaves the registration disposed.
    async fn dispose_registration(registration: &Registration) -> Result<(), DisposeError> {
        let _guard = registration.lock().await;
        match registration.take_instance() {
            Some(object) => Self::dispose_object(registration.key(), &object).await,
            None => Ok(()),
        }
    }

    async fn dispose_object(key: &ServiceKey, object: &Instance) -> Result<(), DisposeError> {
        tracing::debug!(%key, "disposing object");
        object.run_dispose_hook().await.map_err(|source| {
            tracing::warn!(%key, error = %source, "dispose hook failed");
            DisposeError::Hook {
                key: key.clone(),
                source,
            }
        })
    }
}
