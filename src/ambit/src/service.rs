use std::any::{self, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use async_trait::async_trait;

use crate::util::any::{AsAny, DowncastArc};

/// The boxed error type produced by factories and lifecycle hooks.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A value which can be managed by a container.
///
/// Implementing [`Service`] is usually a one-liner. A type which needs to run
/// code right after construction or during disposal additionally implements
/// [`OnConstruct`] or [`OnDispose`] and advertises it by overriding the
/// corresponding accessor:
///
/// ```rust
/// # use ambit::prelude::*;
/// struct Connection;
///
/// #[async_trait]
/// impl OnDispose for Connection {
///     async fn on_dispose(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// impl Service for Connection {
///     fn dispose_hook(&self) -> Option<&dyn OnDispose> {
///         Some(self)
///     }
/// }
/// ```
pub trait Service: AsAny {
    fn construct_hook(&self) -> Option<&dyn OnConstruct> {
        None
    }

    fn dispose_hook(&self) -> Option<&dyn OnDispose> {
        None
    }
}

/// A hook invoked once, right after the factory completes and before the
/// instance is handed out.
#[async_trait]
pub trait OnConstruct: Send + Sync {
    async fn on_construct(&self) -> Result<(), BoxError>;
}

/// A hook invoked once, during the disposal pass covering the instance.
#[async_trait]
pub trait OnDispose: Send + Sync {
    async fn on_dispose(&self) -> Result<(), BoxError>;
}

impl<S: Service + ?Sized> Service for Box<S> {
    fn construct_hook(&self) -> Option<&dyn OnConstruct> {
        (**self).construct_hook()
    }

    fn dispose_hook(&self) -> Option<&dyn OnDispose> {
        (**self).dispose_hook()
    }
}

impl<S: Service + ?Sized> Service for Arc<S> {
    fn construct_hook(&self) -> Option<&dyn OnConstruct> {
        (**self).construct_hook()
    }

    fn dispose_hook(&self) -> Option<&dyn OnDispose> {
        (**self).dispose_hook()
    }
}

macro_rules! impl_service {
    ($($ty:ty),* $(,)?) => {
        $(impl Service for $ty {})*
    };
}

impl_service!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str,
);

impl<T: Send + Sync + 'static> Service for Vec<T> {}

impl<T: Send + Sync + 'static> Service for Option<T> {}

impl<K, V> Service for HashMap<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
}

impl<K, V> Service for BTreeMap<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
}

/// A type-erased, shared service instance as cached by the container.
#[derive(Clone)]
pub struct Instance {
    object: Arc<dyn Service>,
    type_id: TypeId,
}

impl Instance {
    pub fn new<T: Service>(object: T) -> Self {
        Self {
            object: Arc::new(object),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        (*self.object).type_name()
    }

    pub fn is<T: Service>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: Service>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast_arc::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }

    pub(crate) async fn run_construct_hook(&self) -> Result<(), BoxError> {
        match self.object.construct_hook() {
            Some(hook) => hook.on_construct().await,
            None => Ok(()),
        }
    }

    pub(crate) async fn run_dispose_hook(&self) -> Result<(), BoxError> {
        match self.object.dispose_hook() {
            Some(hook) => hook.on_dispose().await,
            None => Ok(()),
        }
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .finish_non_exhaustive()
    }
}

/// The concrete type produced by a provider, recorded on each registration so
/// typed lookups can be checked before any factory runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputType {
    id: TypeId,
    name: &'static str,
}

impl OutputType {
    pub fn of<T: Service>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Service>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}
