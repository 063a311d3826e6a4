//! Named lookup registries for notifiers and actions.
//!
//! Reified as a process-wide (but dependency-injected, not `static`) map
//! that is populated once at bring-up via `register_builtins` and is safe
//! to read concurrently afterward. Entries are *factories*: given the event
//! the task was built from, a factory produces the bound [`TaskCallback`]
//! the event loop actually invokes. This is how a single registered
//! `"console"` notifier ends up printing each task's own id/title instead
//! of one fixed message for every task.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::models::event::Event;
use crate::domain::models::TaskCallback;

pub type CallbackFactory = Arc<dyn Fn(&Event) -> TaskCallback + Send + Sync>;

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    entries: Arc<RwLock<HashMap<String, CallbackFactory>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, factory: CallbackFactory) {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(name.into(), factory);
    }

    /// Resolve `name` against `event`, producing a bound callback.
    pub fn resolve(&self, name: &str, event: &Event) -> Option<TaskCallback> {
        let factory = self.entries.read().expect("registry lock poisoned").get(name).cloned()?;
        Some(factory(event))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().expect("registry lock poisoned").contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
