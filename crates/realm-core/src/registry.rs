//! Named module factories initialized in registration order.
//!
//! A module is constructed from the shared application context by its
//! factory and may expose an asynchronous initializer. [`ModuleRegistry::init_all`]
//! walks the registrations sequentially: a module that fails to construct
//! or initialize is logged with its name and recorded in the returned
//! [`InitReport`], and the walk continues with the next module. Modules
//! that already initialized are left alone; there is no teardown.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;

/// A UI-region controller managed by the registry.
pub trait Module: Send + Sync + 'static {
    /// Optional asynchronous initializer, awaited by
    /// [`ModuleRegistry::init_all`] right after construction.
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        None
    }
}

/// Lifecycle position of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Factory stored, not yet constructed.
    Registered,
    /// Constructed, initializer not run or not finished.
    Constructed,
    /// Constructed and initialized.
    Initialized,
    /// Construction or initialization failed.
    Failed,
}

/// Which step of module start-up failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStage {
    /// The factory returned an error or panicked.
    Construct,
    /// The initializer returned an error or panicked.
    Initialize,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct => f.write_str("construct"),
            Self::Initialize => f.write_str("initialize"),
        }
    }
}

/// One module that failed to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFailure {
    /// Registration name.
    pub name: String,
    /// Failing step.
    pub stage: InitStage,
    /// Rendered error.
    pub error: String,
}

/// Outcome of [`ModuleRegistry::init_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// Modules that initialized, in order.
    pub initialized: Vec<String>,
    /// Modules that failed, in order.
    pub failed: Vec<ModuleFailure>,
}

impl InitReport {
    /// Whether every module initialized.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Instance {
    module: Arc<dyn Module>,
    any: Arc<dyn Any + Send + Sync>,
}

type Factory<C> = Box<dyn Fn(&C) -> anyhow::Result<Instance> + Send + Sync>;

struct Registration<C> {
    name: String,
    factory: Factory<C>,
    status: ModuleStatus,
    instance: Option<Instance>,
}

/// Ordered set of module factories over a context `C`.
pub struct ModuleRegistry<C> {
    registrations: Vec<Registration<C>>,
}

impl<C> Default for ModuleRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ModuleRegistry<C> {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Store `factory` under `name`.
    ///
    /// Registering a name twice replaces the earlier factory in place, so
    /// the module keeps its original position, and logs a warning.
    pub fn register<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: Module,
        F: Fn(&C) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: Factory<C> = Box::new(move |context| {
            let module = Arc::new(factory(context)?);
            Ok(Instance {
                module: Arc::clone(&module) as Arc<dyn Module>,
                any: module as Arc<dyn Any + Send + Sync>,
            })
        });
        let registration = Registration {
            name,
            factory,
            status: ModuleStatus::Registered,
            instance: None,
        };

        if let Some(existing) = self
            .registrations
            .iter_mut()
            .find(|existing| existing.name == registration.name)
        {
            tracing::warn!(module = %registration.name, "Module already registered, overwriting");
            *existing = registration;
        } else {
            self.registrations.push(registration);
        }
    }

    /// Construct and initialize every module, sequentially, in
    /// registration order.
    pub async fn init_all(&mut self, context: &C) -> InitReport {
        let mut report = InitReport::default();

        for registration in &mut self.registrations {
            let name = registration.name.clone();
            registration.instance = None;

            let constructed = match panic::catch_unwind(AssertUnwindSafe(|| {
                (registration.factory)(context)
            })) {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("module factory panicked")),
            };
            let instance = match constructed {
                Ok(instance) => instance,
                Err(error) => {
                    registration.status = ModuleStatus::Failed;
                    report.failed.push(failure(&name, InitStage::Construct, &error));
                    continue;
                }
            };
            registration.status = ModuleStatus::Constructed;
            let module = Arc::clone(&instance.module);
            registration.instance = Some(instance);

            let initialized = match module.init() {
                None => Ok(()),
                Some(init) => AssertUnwindSafe(init)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("module initializer panicked"))),
            };
            match initialized {
                Ok(()) => {
                    registration.status = ModuleStatus::Initialized;
                    tracing::debug!(module = %name, "Module initialized");
                    report.initialized.push(name);
                }
                Err(error) => {
                    registration.status = ModuleStatus::Failed;
                    report.failed.push(failure(&name, InitStage::Initialize, &error));
                }
            }
        }

        report
    }

    /// Lifecycle position of `name`, if registered.
    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.registrations
            .iter()
            .find(|registration| registration.name == name)
            .map(|registration| registration.status)
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .map(|registration| registration.name.as_str())
            .collect()
    }

    /// The constructed module registered as `name`, if it has type `T`.
    pub fn get<T: Module>(&self, name: &str) -> Option<Arc<T>> {
        let registration = self
            .registrations
            .iter()
            .find(|registration| registration.name == name)?;
        let instance = registration.instance.as_ref()?;
        Arc::clone(&instance.any).downcast::<T>().ok()
    }
}

fn failure(name: &str, stage: InitStage, error: &anyhow::Error) -> ModuleFailure {
    tracing::error!(module = %name, %stage, error = %error, "Failed to initialize module");
    ModuleFailure {
        name: name.to_owned(),
        stage,
        error: format!("{error:#}"),
    }
}
