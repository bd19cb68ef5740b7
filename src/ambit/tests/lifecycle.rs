use std::sync::Arc;
use std::time::Duration;

use ambit::prelude::*;
use parking_lot::Mutex;
use tokio::time::Instant;

const FAST: Token = Token::named("fast");
const MEDIUM: Token = Token::named("medium");
const SLOW: Token = Token::named("slow");
const SESSION: Token = Token::named("session");
const BROKEN: Token = Token::named("broken");

type Journal = Arc<Mutex<Vec<&'static str>>>;

struct Resource {
    name: &'static str,
    delay: Duration,
    fail: bool,
    journal: Journal,
}

#[async_trait]
impl OnDispose for Resource {
    async fn on_dispose(&self) -> Result<(), BoxError> {
        tokio::time::sleep(self.delay).await;
        self.journal.lock().push(self.name);
        if self.fail {
            return Err(format!("{} is still in use", self.name).into());
        }
        Ok(())
    }
}

impl Service for Resource {
    fn dispose_hook(&self) -> Option<&dyn OnDispose> {
        Some(self)
    }
}

struct ResourceModule {
    journal: Journal,
}

impl ResourceModule {
    fn resource(
        &self,
        name: &'static str,
        millis: u64,
        fail: bool,
    ) -> impl Fn(Resolver) -> std::future::Ready<Result<Resource, BoxError>> + Send + Sync + 'static
    {
        let journal = Arc::clone(&self.journal);
        move |_| {
            std::future::ready(Ok(Resource {
                name,
                delay: Duration::from_millis(millis),
                fail,
                journal: Arc::clone(&journal),
            }))
        }
    }
}

impl Module for ResourceModule {
    fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
        configurer
            .add_singleton(&SLOW, self.resource("slow", 300, false), SingletonOptions::eager())?
            .add_singleton(&FAST, self.resource("fast", 100, false), SingletonOptions::eager())?
            .add_singleton(&MEDIUM, self.resource("medium", 200, false), SingletonOptions::eager())?
            .add_singleton(&BROKEN, self.resource("broken", 0, true), SingletonOptions::lazy())?
            .add_scoped(&SESSION, self.resource("session", 0, false))?;
        Ok(())
    }
}

async fn build() -> (Resolver, Journal) {
    let journal = Journal::default();
    let container = Container::init(ResourceModule {
        journal: Arc::clone(&journal),
    })
    .unwrap();
    let resolver = container.build(BuildOptions::default()).await.unwrap();
    (resolver, journal)
}

#[tokio::test]
async fn singletons_are_disposed_concurrently() {
    let (resolver, journal) = build().await;

    let start = Instant::now();
    resolver.dispose_singletons().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(*journal.lock(), ["fast", "medium", "slow"]);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
}

#[tokio::test]
async fn disposing_twice_runs_hooks_once() {
    let (resolver, journal) = build().await;

    resolver.dispose().await.unwrap();
    resolver.dispose().await.unwrap();
    assert_eq!(journal.lock().len(), 3);

    resolver.resolve::<Resource>(&FAST).await.unwrap();
    resolver.dispose().await.unwrap();
    assert_eq!(*journal.lock(), ["fast", "medium", "slow", "fast"]);
}

#[tokio::test]
async fn failing_hook_does_not_block_other_disposals() {
    let (resolver, journal) = build().await;
    resolver.resolve::<Resource>(&BROKEN).await.unwrap();

    let err = resolver.dispose_singletons().await.unwrap_err();
    match err {
        DisposeError::Hook { key, .. } => assert_eq!(key, ServiceKey::from(&BROKEN)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*journal.lock(), ["broken", "fast", "medium", "slow"]);

    resolver.dispose_singletons().await.unwrap();
    assert_eq!(journal.lock().len(), 4);
}

#[tokio::test]
async fn request_scope_is_disposed_when_callback_panics() {
    let (resolver, journal) = build().await;

    let handle = tokio::spawn({
        let resolver = resolver.clone();
        async move {
            resolver
                .run_with_new_request_scope(None, async {
                    resolver.resolve::<Resource>(&SESSION).await.unwrap();
                    panic!("handler crashed");
                })
                .await
        }
    });

    let err = handle.await.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(*journal.lock(), ["session"]);
    assert!(!resolver.is_in_request_scope_context());
}

#[tokio::test]
async fn request_scope_disposal_failure_keeps_output() {
    const FLAKY: Token = Token::named("flaky");

    let journal = Journal::default();
    let mut container = Container::new();
    let flaky = ResourceModule {
        journal: Arc::clone(&journal),
    }
    .resource("flaky", 0, true);
    container.add_scoped(&FLAKY, flaky).unwrap();
    let resolver = container.resolver();

    let err = resolver
        .run_with_new_request_scope(None, async {
            let flaky = resolver.resolve::<Resource>(&FLAKY).await.unwrap();
            flaky.name.len()
        })
        .await
        .unwrap_err();

    assert_eq!(*err.output(), 5);
    assert_eq!(err.error().hook_failures(), 1);
    assert_eq!(err.into_output(), 5);
    assert_eq!(*journal.lock(), ["flaky"]);
}

#[tokio::test]
async fn replaced_singleton_is_still_disposed() {
    const CACHE: Token = Token::named("cache");

    let journal = Journal::default();
    let module = ResourceModule {
        journal: Arc::clone(&journal),
    };
    let mut container = Container::new();
    container
        .add_singleton(&CACHE, module.resource("old", 0, false), SingletonOptions::lazy())
        .unwrap();
    let resolver = container.resolver();
    let old = resolver.resolve::<Resource>(&CACHE).await.unwrap();

    container
        .add_singleton(&CACHE, module.resource("new", 0, false), SingletonOptions::lazy())
        .unwrap();
    let new = resolver.resolve::<Resource>(&CACHE).await.unwrap();
    assert_eq!((old.name, new.name), ("old", "new"));

    resolver.dispose_singletons().await.unwrap();
    let mut disposed = journal.lock().clone();
    disposed.sort_unstable();
    assert_eq!(disposed, ["new", "old"]);

    resolver.dispose_singletons().await.unwrap();
    assert_eq!(journal.lock().len(), 2);
}

#[tokio::test]
async fn replaced_scoped_registration_takes_effect_inside_open_scope() {
    const STEP: Token = Token::named("step");

    let journal = Journal::default();
    let module = ResourceModule {
        journal: Arc::clone(&journal),
    };
    let mut container = Container::new();
    container
        .add_scoped(&STEP, module.resource("first", 0, false))
        .unwrap();
    let resolver = container.resolver();

    let (before, after) = resolver
        .run_with_new_request_scope(None, async {
            let before = resolver.resolve::<Resource>(&STEP).await.unwrap();
            container
                .add_scoped(&STEP, module.resource("second", 0, false))
                .unwrap();
            let after = resolver.resolve::<Resource>(&STEP).await.unwrap();
            let again = resolver.resolve::<Resource>(&STEP).await.unwrap();
            assert!(Arc::ptr_eq(&after, &again));
            (before.name, after.name)
        })
        .await
        .unwrap();

    assert_eq!((before, after), ("first", "second"));
    let mut disposed = journal.lock().clone();
    disposed.sort_unstable();
    assert_eq!(disposed, ["first", "second"]);
}
