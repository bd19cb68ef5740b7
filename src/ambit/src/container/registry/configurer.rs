use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::registry::{Configurer, ConfigurerPrivate, RegistryError, ServiceMap};
use crate::module::Module;
use crate::provider::Provider;
use crate::scope::Lifetime;
use crate::token::ServiceKey;

pub struct ConfigurerImpl {
    services: Arc<RwLock<ServiceMap>>,
    modules: Vec<Arc<dyn Module>>,
}

#[cfg(test)]
impl std::fmt::Debug for ConfigurerImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurerImpl").finish_non_exhaustive()
    }
}

impl ConfigurerImpl {
    pub fn new(services: Arc<RwLock<ServiceMap>>) -> Self {
        Self {
            services,
            modules: Vec::new(),
        }
    }

    fn is_module_added(&self, module: &Arc<dyn Module>) -> bool {
        let target = Arc::as_ptr(module) as *const ();
        self.modules
            .iter()
            .any(|m| Arc::as_ptr(m) as *const () == target)
    }
}

impl Configurer for ConfigurerImpl {
    #[allow(private_interfaces)]
    fn as_private(&mut self) -> &mut dyn ConfigurerPrivate {
        self
    }
}

impl ConfigurerPrivate for ConfigurerImpl {
    fn dyn_register(
        &mut self,
        key: ServiceKey,
        lifetime: Lifetime,
        provider: Box<dyn Provider>,
        eager: bool,
    ) -> Result<(), RegistryError> {
        let replaced = self
            .services
            .write()
            .insert(key.clone(), lifetime, provider, eager)?;

        if replaced.is_some() {
            tracing::debug!(%key, %lifetime, "replaced service registration");
        } else {
            tracing::debug!(%key, %lifetime, eager, "registered service");
        }
        Ok(())
    }

    fn dyn_add_module(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let name = module.name();
        if self.is_module_added(&module) {
            tracing::debug!(module = name, "skipped module which is already added");
            return Ok(());
        }

        self.modules.push(Arc::clone(&module));
        tracing::debug!(module = name, "adding module");
        module
            .configure(self)
            .map_err(|err| RegistryError::from_module(name, err))
    }
}
