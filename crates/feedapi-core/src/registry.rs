//! Explicit registry of feeds exposed by a server.
//!
//! Built once at startup and handed to the transport layer; there is no
//! process-wide lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::publisher::EventPublisher;

#[derive(Default, Clone)]
pub struct FeedRegistry {
    feeds: BTreeMap<String, Arc<dyn EventPublisher>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `publisher` under its [`EventPublisher::name`].
    pub fn register(&mut self, publisher: Arc<dyn EventPublisher>) -> Result<(), RegistryError> {
        let name = publisher.name().to_owned();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.feeds.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(feed = %name, "feed registered");
        self.feeds.insert(name, publisher);
        Ok(())
    }

    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Result<Self, RegistryError> {
        self.register(publisher)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EventPublisher>> {
        self.feeds.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.feeds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl fmt::Debug for FeedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedRegistry")
            .field("feeds", &self.feeds.keys().collect::<Vec<_>>())
            .finish()
    }
}
