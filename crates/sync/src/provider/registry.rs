use std::fmt;
use std::sync::Arc;

use exn::OptionExt;

use super::{ManifestProvider, Provider};
use crate::error::{ErrorKind, Result};

/// Turns a source string into a provider, if it recognizes the source.
pub trait Resolver: Send + Sync {
    fn resolve(&self, source: &str) -> Option<Box<dyn Provider>>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Option<Box<dyn Provider>> + Send + Sync,
{
    fn resolve(&self, source: &str) -> Option<Box<dyn Provider>> {
        self(source)
    }
}

/// Ordered list of resolvers. The first one that recognizes a source wins.
#[derive(Clone, Default)]
pub struct Registry {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl Registry {
    /// A registry with no resolvers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that understands manifest files.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(|source: &str| ManifestProvider::resolve(source).map(|p| Box::new(p) as Box<dyn Provider>));
        registry
    }

    pub fn register(&mut self, resolver: impl Resolver + 'static) -> &mut Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn resolve(&self, source: &str) -> Result<Box<dyn Provider>> {
        let provider = self.resolvers.iter().find_map(|r| r.resolve(source));
        provider.ok_or_raise(|| ErrorKind::UnsupportedSource(source.to_string()))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("resolvers", &self.resolvers.len()).finish()
    }
}
