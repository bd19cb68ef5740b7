use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ambit::prelude::*;
use tracing_subscriber::EnvFilter;

const APP_NAME: Token = Token::named("app_name");
const REQUEST_COUNTER: Token = Token::named("request_counter");
const GREETER: Token = Token::named("greeter");
const SESSION: Token = Token::named("session");

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let container = Container::init(AppModule::new("greeter"))?;
    let resolver = container.build(BuildOptions::default()).await?;

    for user in ["alice", "bob"] {
        let store = ScopeStore::new().with_value("user", String::from(user));
        resolver
            .run_with_new_request_scope(Some(store), handle_request(resolver.clone()))
            .await
            .map_err(|err| err.into_parts().1)??;
    }

    let chinese = resolver.resolve::<Greeter>(GREETER.tagged("Chinese")).await?;
    println!("{}", chinese.greet("world"));

    for descriptor in resolver.discovery().get_all() {
        println!(
            "{} ({}, {})",
            descriptor.key(),
            descriptor.lifetime(),
            descriptor.output_type()
        );
    }

    resolver.dispose().await?;
    Ok(())
}

async fn handle_request(resolver: Resolver) -> Result<(), ResolveError> {
    let session = resolver.resolve::<Session>(&SESSION).await?;
    let greeter = resolver.resolve::<Greeter>(GREETER.tagged("english")).await?;
    println!("#{} {}", session.id, greeter.greet(&session.user));
    Ok(())
}

struct AppModule {
    app_name: &'static str,
}

impl AppModule {
    fn new(app_name: &'static str) -> Self {
        Self { app_name }
    }
}

impl Module for AppModule {
    fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
        configurer
            .add_instance(&APP_NAME, String::from(self.app_name))?
            .add_singleton(
                &REQUEST_COUNTER,
                |_| async { Ok(RequestCounter::default()) },
                SingletonOptions::eager(),
            )?
            .add_singleton(
                GREETER.tagged("english"),
                |resolver: Resolver| async move {
                    let app_name = resolver.resolve::<String>(&APP_NAME).await?;
                    Ok(Greeter::new(app_name, "Hello"))
                },
                SingletonOptions::lazy(),
            )?
            .add_singleton(
                GREETER.tagged("chinese"),
                |resolver: Resolver| async move {
                    let app_name = resolver.resolve::<String>(&APP_NAME).await?;
                    Ok(Greeter::new(app_name, "你好"))
                },
                SingletonOptions::lazy(),
            )?
            .add_scoped(&SESSION, |resolver: Resolver| async move {
                let counter = resolver.resolve::<RequestCounter>(&REQUEST_COUNTER).await?;
                let user = RequestScope::current_store()
                    .and_then(|store| store.get::<String>("user"))
                    .ok_or("request carries no user")?;
                Ok(Session {
                    id: counter.next(),
                    user: user.as_ref().clone(),
                })
            })?;
        Ok(())
    }
}

#[derive(Default)]
struct RequestCounter(AtomicU64);

impl RequestCounter {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Service for RequestCounter {}

struct Greeter {
    app_name: Arc<String>,
    salutation: &'static str,
}

impl Greeter {
    fn new(app_name: Arc<String>, salutation: &'static str) -> Self {
        Self {
            app_name,
            salutation,
        }
    }

    fn greet(&self, name: &str) -> String {
        format!("[{}] {}, {}!", self.app_name, self.salutation, name)
    }
}

impl Service for Greeter {}

struct Session {
    id: u64,
    user: String,
}

#[async_trait]
impl OnDispose for Session {
    async fn on_dispose(&self) -> Result<(), BoxError> {
        println!("#{} closed for {}", self.id, self.user);
        Ok(())
    }
}

impl Service for Session {
    fn dispose_hook(&self) -> Option<&dyn OnDispose> {
        Some(self)
    }
}
