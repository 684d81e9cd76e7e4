//! Process-level shutdown coordination.
//!
//! A [`ProcessContext`] is created once by the owning program and handed to
//! every component that needs to clean up on exit. Components register a
//! shutdown hook; the context runs all hooks exactly once, most recently
//! registered first.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

type Hook = Box<dyn FnOnce() + Send>;

struct Hooks {
    pending: Vec<(String, Hook)>,
    shut_down: bool,
}

/// Owns the shutdown hooks of one process.
pub struct ProcessContext {
    hooks: Mutex<Hooks>,
    trigger: ShutdownTrigger,
    requested: Receiver<()>,
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessContext {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            hooks: Mutex::new(Hooks {
                pending: Vec::new(),
                shut_down: false,
            }),
            trigger: ShutdownTrigger {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            requested: rx,
        }
    }

    /// Run `hook` during shutdown. If shutdown already happened it runs now.
    pub fn register_shutdown_hook<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let mut hooks = self.hooks.lock();
        if hooks.shut_down {
            drop(hooks);
            tracing::debug!(hook = %name, "running late shutdown hook");
            hook();
            return;
        }
        hooks.pending.push((name, Box::new(hook)));
    }

    /// Ask the owner to shut down. Does not run any hook itself.
    pub fn request_shutdown(&self) {
        self.trigger.fire();
    }

    /// Cloneable handle that can request shutdown from another thread.
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Becomes disconnected once shutdown has been requested; `recv` on it
    /// returns `Err` from then on.
    pub fn shutdown_requested(&self) -> Receiver<()> {
        self.requested.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.trigger.is_fired()
    }

    /// Run every registered hook once, newest first. Later calls do nothing.
    pub fn shutdown(&self) {
        self.request_shutdown();
        let pending = {
            let mut hooks = self.hooks.lock();
            if hooks.shut_down {
                return;
            }
            hooks.shut_down = true;
            std::mem::take(&mut hooks.pending)
        };

        for (name, hook) in pending.into_iter().rev() {
            tracing::debug!(hook = %name, "running shutdown hook");
            hook();
        }
    }
}

impl Drop for ProcessContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Requests shutdown of a [`ProcessContext`] from anywhere.
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl ShutdownTrigger {
    /// Disconnects every `shutdown_requested` receiver. Idempotent.
    pub fn fire(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!("shutdown requested");
        }
    }

    pub fn is_fired(&self) -> bool {
        self.sender.lock().is_none()
    }
}
