use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::Service;
use crate::error::ServiceError;
use crate::settings::EvolverSettings;
use crate::sync::lock;

/// Where a registered service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Registered,
    Initialized,
    Stopped,
    Faulted,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Registered => "Registered",
            ServiceState::Initialized => "Initialized",
            ServiceState::Stopped => "Stopped",
            ServiceState::Faulted => "Faulted",
        };
        f.write_str(s)
    }
}

struct Entry {
    name: String,
    service: Arc<Mutex<dyn Service>>,
    typed: Arc<dyn Any + Send + Sync>,
    state: ServiceState,
}

/// Typed service registry.
///
/// Services are keyed by name and retrieved with their concrete type, so a
/// lookup with the wrong type yields `None` rather than a bad cast.
#[derive(Default)]
pub struct ServiceManager {
    entries: Vec<Entry>,
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.name, e.state)))
            .finish()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under `name`. Returns false if the name is taken.
    pub fn register_service<S>(&mut self, name: impl Into<String>, service: Arc<Mutex<S>>) -> bool
    where
        S: Service + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        let typed: Arc<dyn Any + Send + Sync> = service.clone();
        self.entries.push(Entry {
            name,
            service,
            typed,
            state: ServiceState::Registered,
        });
        true
    }

    /// Look up a service by name and concrete type.
    pub fn get_service<S>(&self, name: &str) -> Option<Arc<Mutex<S>>>
    where
        S: Service + 'static,
    {
        let entry = self.entries.iter().find(|e| e.name == name)?;
        Arc::clone(&entry.typed).downcast::<Mutex<S>>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.state)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Initialize every service in registration order, stopping at the first
    /// failure.
    pub fn initialize(&mut self, settings: &EvolverSettings) -> Result<(), ServiceError> {
        for entry in &mut self.entries {
            let outcome = lock(&entry.service).initialize(settings);
            match outcome {
                Ok(()) => entry.state = ServiceState::Initialized,
                Err(e) => {
                    entry.state = ServiceState::Faulted;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), ServiceError> {
        for entry in &mut self.entries {
            let outcome = lock(&entry.service).restart();
            match outcome {
                Ok(()) => entry.state = ServiceState::Initialized,
                Err(e) => {
                    entry.state = ServiceState::Faulted;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Shut every service down, even past a failure. Returns the first error.
    pub fn shutdown(&mut self) -> Result<(), ServiceError> {
        let mut first_error = None;
        for entry in &mut self.entries {
            if entry.state == ServiceState::Stopped {
                continue;
            }
            let outcome = lock(&entry.service).shutdown();
            match outcome {
                Ok(()) => entry.state = ServiceState::Stopped,
                Err(e) => {
                    entry.state = ServiceState::Faulted;
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
