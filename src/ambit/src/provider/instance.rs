use std::fmt::{Debug, Formatter, Result as FmtResult};

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use crate::container::Resolver;
use crate::provider::TypedProvider;
use crate::service::{BoxError, Service};

/// A provider handing out clones of a pre-built value.
pub struct InstanceProvider<T>
where
    T: Service + Clone,
{
    instance: T,
}

impl<T> InstanceProvider<T>
where
    T: Service + Clone,
{
    pub fn new(instance: T) -> Self {
        Self { instance }
    }
}

impl<T> Debug for InstanceProvider<T>
where
    T: Service + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstanceProvider")
            .field("output", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> TypedProvider for InstanceProvider<T>
where
    T: Service + Clone,
{
    type Output = T;

    fn provide(&self, _resolver: Resolver) -> BoxFuture<'static, Result<Self::Output, BoxError>> {
        future::ready(Ok(self.instance.clone())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::container::Container;
    use crate::provider::Provider;
    use crate::service::OutputType;

    use super::*;

    #[tokio::test]
    async fn instance_provider_succeeds() {
        let provider = InstanceProvider::new(42i32);
        let resolver = Container::new().resolver();

        let res = provider.provide(resolver.clone()).await;
        assert_eq!(res.unwrap(), 42);

        let res = provider.dyn_provide(resolver).await.unwrap();
        assert_eq!(res.downcast::<i32>().as_deref(), Some(&42));
        assert_eq!(provider.output(), OutputType::of::<i32>());
    }
}
