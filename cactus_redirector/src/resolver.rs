//! Class resolution.
//!
//! Test classes are found through a chain of resolvers: the context resolver
//! (the registry of the application under test) first, then the framework
//! resolver (classes shipped with the redirector itself). The first success
//! wins. A class whose declared library is absent fails with
//! [`ClassLoadError::MissingDependency`] and stops the search.

use crate::test_case::TestFactory;
use crate::wrapper::WrapperClass;
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassLoadError {
    #[error("Class [{0}] not found")]
    NotFound(String),

    #[error(
        "Error finding class [{0}] using both the context resolver and the framework resolver. \
         Possible causes include: the test class is not registered with the redirector, \
         or the class name sent by the client is misspelled"
    )]
    NotFoundInChain(String),

    #[error("Class [{class_name}] could not be loaded: required class [{missing}] is missing")]
    MissingDependency { class_name: String, missing: String },
}

/// Looks up test classes by name.
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, class_name: &str) -> Result<Arc<dyn TestFactory>, ClassLoadError>;
}

/// Test classes of the application under test, plus the libraries the
/// application provides.
#[derive(Default)]
pub struct TestRegistry {
    classes: HashMap<String, Arc<dyn TestFactory>>,
    libraries: BTreeSet<String>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, factory: impl TestFactory + 'static) -> Self {
        self.classes
            .insert(factory.class_name().to_string(), Arc::new(factory));
        self
    }

    /// Declares a library as present. A library name covers every class
    /// name it prefixes (`junit/framework` provides
    /// `junit/framework/TestCase`).
    pub fn provide(mut self, library: impl Into<String>) -> Self {
        self.libraries.insert(library.into());
        self
    }

    pub fn provides(&self, class_path: &str) -> bool {
        self.libraries.iter().any(|lib| {
            class_path == lib
                || class_path
                    .strip_prefix(lib.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRegistry")
            .field("classes", &self.class_names())
            .field("libraries", &self.libraries)
            .finish()
    }
}

impl ClassResolver for TestRegistry {
    fn resolve(&self, class_name: &str) -> Result<Arc<dyn TestFactory>, ClassLoadError> {
        let factory = self
            .classes
            .get(class_name)
            .ok_or_else(|| ClassLoadError::NotFound(class_name.to_string()))?;
        if let Some(missing) = factory.requirements().iter().find(|lib| !self.provides(lib)) {
            return Err(ClassLoadError::MissingDependency {
                class_name: class_name.to_string(),
                missing: missing.clone(),
            });
        }
        Ok(factory.clone())
    }
}

/// Classes shipped with the redirector: the test wrappers.
#[derive(Debug)]
pub struct FrameworkResolver {
    wrappers: Vec<Arc<WrapperClass>>,
}

impl Default for FrameworkResolver {
    fn default() -> Self {
        Self {
            wrappers: WrapperClass::all().into_iter().map(Arc::new).collect(),
        }
    }
}

impl FrameworkResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClassResolver for FrameworkResolver {
    fn resolve(&self, class_name: &str) -> Result<Arc<dyn TestFactory>, ClassLoadError> {
        self.wrappers
            .iter()
            .find(|w| w.class_name() == class_name)
            .map(|w| w.clone() as Arc<dyn TestFactory>)
            .ok_or_else(|| ClassLoadError::NotFound(class_name.to_string()))
    }
}

/// Context resolver first, framework resolver second.
#[derive(Clone)]
pub struct ChainedResolver {
    context: Arc<dyn ClassResolver>,
    framework: Arc<dyn ClassResolver>,
}

impl ChainedResolver {
    pub fn new(context: Arc<dyn ClassResolver>, framework: Arc<dyn ClassResolver>) -> Self {
        Self { context, framework }
    }

    /// Chain over a test registry and the stock framework resolver.
    pub fn with_registry(registry: TestRegistry) -> Self {
        Self::new(Arc::new(registry), Arc::new(FrameworkResolver::new()))
    }
}

impl fmt::Debug for ChainedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedResolver").finish_non_exhaustive()
    }
}

impl ClassResolver for ChainedResolver {
    fn resolve(&self, class_name: &str) -> Result<Arc<dyn TestFactory>, ClassLoadError> {
        match self.context.resolve(class_name) {
            Err(ClassLoadError::NotFound(_)) => {
                debug!(class_name, "Not found by the context resolver, trying the framework resolver");
                self.framework.resolve(class_name).map_err(|err| match err {
                    ClassLoadError::NotFound(name) => ClassLoadError::NotFoundInChain(name),
                    other => other,
                })
            }
            other => other,
        }
    }
}
