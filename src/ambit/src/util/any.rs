use std::any::{self, Any};
use std::sync::Arc;

pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

pub trait DowncastArc {
    fn downcast_arc<T: Any + Send + Sync>(self) -> Result<Arc<T>, Self>
    where
        Self: Sized;
}

impl<S> DowncastArc for Arc<S>
where
    S: AsAny + ?Sized,
{
    fn downcast_arc<T: Any + Send + Sync>(self) -> Result<Arc<T>, Self> {
        if (*self).as_any().is::<T>() {
            let res = self
                .into_any_arc()
                .downcast::<T>()
                .unwrap_or_else(|_| unreachable!("`self` should be `Arc<T>`"));
            Ok(res)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Trait: AsAny {}

    impl Trait for i32 {}

    #[test]
    fn downcast_arc_succeeds_when_type_matches() {
        let x: Arc<dyn Trait> = Arc::new(7i32);
        assert_eq!((*x).type_name(), "i32");

        let y = x.downcast_arc::<i32>().unwrap_or_else(|_| Arc::new(0));
        assert_eq!(*y, 7);
    }

    #[test]
    fn downcast_arc_fails_when_type_differs() {
        let x: Arc<dyn Trait> = Arc::new(7i32);
        let back = x.downcast_arc::<u64>().unwrap_err();
        assert!((*back).as_any().is::<i32>());
    }
}
