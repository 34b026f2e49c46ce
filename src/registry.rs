//! Process-wide component registry
//!
//! Registration is an explicit, one-time step performed before any node
//! construction; instantiation is asynchronous, completing on a worker thread
//! at some later point. Both are safe to call from any thread.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::error::Error;
use crate::unit::{ComponentDescriptor, EffectUnit, InstantiationOptions, UnitFactory};

struct RegisteredComponent {
    display_name: String,
    version: u32,
    factory: UnitFactory,
}

/// Registry of instantiable audio components, keyed by descriptor
pub struct ComponentRegistry {
    entries: Mutex<HashMap<ComponentDescriptor, RegisteredComponent>>,
}

static GLOBAL: OnceLock<ComponentRegistry> = OnceLock::new();

/// The process-wide registry shared by all nodes
pub fn global() -> &'static ComponentRegistry {
    GLOBAL.get_or_init(ComponentRegistry::new)
}

impl ComponentRegistry {
    /// An empty registry, independent of the global one
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a component implementation under `descriptor`
    ///
    /// Re-registering the same descriptor with the same display name and
    /// version is a no-op. Re-registering with a different identity is an
    /// error: the first registration stays in effect.
    pub fn register(
        &self,
        descriptor: ComponentDescriptor,
        display_name: &str,
        version: u32,
        factory: UnitFactory,
    ) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(existing) = entries.get(&descriptor) {
            if existing.display_name == display_name && existing.version == version {
                debug!(%descriptor, display_name, version, "component already registered");
                return Ok(());
            }
            warn!(
                %descriptor,
                registered = %existing.display_name,
                attempted = display_name,
                "conflicting component registration rejected"
            );
            return Err(Error::ConflictingRegistration(descriptor));
        }

        debug!(%descriptor, display_name, version, "component registered");
        entries.insert(
            descriptor,
            RegisteredComponent {
                display_name: display_name.to_owned(),
                version,
                factory,
            },
        );
        Ok(())
    }

    /// Whether any component is registered under `descriptor`
    pub fn is_registered(&self, descriptor: &ComponentDescriptor) -> bool {
        self.entries.lock().unwrap().contains_key(descriptor)
    }

    /// Display name of the component registered under `descriptor`, if any
    pub fn display_name(&self, descriptor: &ComponentDescriptor) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries.get(descriptor).map(|c| c.display_name.clone())
    }

    /// Instantiate the component registered under `descriptor`
    ///
    /// Always asynchronous: `completion` runs on a worker thread at some
    /// later point, with either the unit or the error. An unknown descriptor
    /// is delivered as `Err(ComponentNotFound)` through the same path.
    pub fn instantiate(
        &self,
        descriptor: ComponentDescriptor,
        options: InstantiationOptions,
        completion: impl FnOnce(Result<Arc<dyn EffectUnit>, Error>) + Send + 'static,
    ) {
        let factory = {
            let entries = self.entries.lock().unwrap();
            entries.get(&descriptor).map(|c| c.factory.clone())
        };

        thread::spawn(move || {
            let result = match factory {
                Some(factory) => {
                    debug!(%descriptor, sample_rate = options.sample_rate, "instantiating component");
                    factory(&options)
                }
                None => {
                    warn!(%descriptor, "instantiation requested for unregistered component");
                    Err(Error::ComponentNotFound(descriptor))
                }
            };
            completion(result);
        });
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
