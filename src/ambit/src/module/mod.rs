use std::any;
use std::sync::Arc;

use crate::container::registry::{Configurer, RegistryError, TypedConfigurer};
use crate::service::BoxError;

/// A unit of service registrations.
///
/// ```rust
/// # use ambit::prelude::*;
/// const GREETING: Token = Token::named("greeting");
///
/// struct GreetingModule;
///
/// impl Module for GreetingModule {
///     fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
///         configurer.add_instance(&GREETING, String::from("hello"))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError>;

    /// A human-readable name used in logs and registry errors.
    fn name(&self) -> &'static str {
        any::type_name::<Self>()
    }
}

/// A module made of other modules, registered in the order they were added.
#[derive(Default)]
pub struct Configuration {
    modules: Vec<Arc<dyn Module>>,
}

impl Configuration {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with<M: Module>(mut self, module: M) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn with_shared(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn compose(mut self, mut other: Configuration) -> Self {
        self.modules.append(&mut other.modules);
        self
    }
}

impl Module for Configuration {
    /// Adds every inner module, even after one of them fails, and reports all
    /// failures together.
    fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
        let mut errors: Vec<RegistryError> = self
            .modules
            .iter()
            .filter_map(|module| configurer.add_module(Arc::clone(module)).err())
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(Box::new(errors.remove(0))),
            _ => Err(Box::new(RegistryError::Aggregated { errors })),
        }
    }
}
