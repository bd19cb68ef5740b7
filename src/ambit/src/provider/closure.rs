use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::marker::PhantomData;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::container::Resolver;
use crate::provider::TypedProvider;
use crate::service::{BoxError, Service};

/// A provider backed by an async closure.
///
/// The closure receives an owned [`Resolver`] handle, so the future it returns
/// can borrow from it freely:
///
/// ```rust
/// # use ambit::prelude::*;
/// # use ambit::provider::ClosureProvider;
/// const NAME: Token = Token::named("name");
///
/// let provider = ClosureProvider::new(|resolver: Resolver| async move {
///     let name = resolver.resolve::<String>(&NAME).await?;
///     Ok(format!("hello, {name}"))
/// });
/// # let _ = provider;
/// ```
pub struct ClosureProvider<F, T> {
    closure: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, Fut, T> ClosureProvider<F, T>
where
    F: Fn(Resolver) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Service,
{
    pub fn new(closure: F) -> Self {
        Self {
            closure,
            _marker: PhantomData,
        }
    }
}

impl<F, T> Debug for ClosureProvider<F, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ClosureProvider")
            .field("output", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<F, Fut, T> TypedProvider for ClosureProvider<F, T>
where
    F: Fn(Resolver) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Service,
{
    type Output = T;

    fn provide(&self, resolver: Resolver) -> BoxFuture<'static, Result<Self::Output, BoxError>> {
        (self.closure)(resolver).boxed()
    }
}
