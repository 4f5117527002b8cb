//! Provider and repository lookup tables.
//!
//! Both are filled by `&mut self` during startup and then moved into the
//! service behind an `Arc`, after which nothing can add or remove entries.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use payments_types::{
    AppError, PaymentMethod, PaymentProcessor, ProviderId, Record, Repository, Transaction,
};

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// Payment providers by identifier.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn PaymentProcessor>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own identifier. A later registration
    /// for the same identifier replaces the earlier one.
    pub fn register(&mut self, provider: Arc<dyn PaymentProcessor>) -> &mut Self {
        let id = provider.id();
        self.register_as(id, provider)
    }

    /// Registers a provider under an explicit key.
    pub fn register_as(
        &mut self,
        key: impl Into<ProviderId>,
        provider: Arc<dyn PaymentProcessor>,
    ) -> &mut Self {
        let key = key.into();
        if self.providers.insert(key.clone(), provider).is_some() {
            tracing::warn!(provider = %key, "provider registered twice, keeping the latest");
        }
        self
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn PaymentProcessor>, AppError> {
        self.providers
            .get(&ProviderId::new(key))
            .cloned()
            .ok_or_else(|| AppError::NotConfigured(format!("payment provider '{}'", key)))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.providers.keys().map(|k| k.to_string()).collect();
        keys.sort();
        keys
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repositories
// ─────────────────────────────────────────────────────────────────────────────

/// Repositories by storage tag.
///
/// Each entry holds an `Arc<dyn Repository<R>>` for one record kind; a
/// lookup with the wrong record type for a tag is treated like a missing
/// tag.
#[derive(Default, Clone)]
pub struct RepositoryRegistry {
    repositories: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `repo` under the record kind's own tag.
    pub fn register<R: Record>(&mut self, repo: Arc<dyn Repository<R>>) -> &mut Self {
        self.register_as(R::TAG, repo)
    }

    pub fn register_as<R: Record>(
        &mut self,
        tag: impl Into<String>,
        repo: Arc<dyn Repository<R>>,
    ) -> &mut Self {
        let tag = tag.into();
        if self.repositories.insert(tag.clone(), Arc::new(repo)).is_some() {
            tracing::warn!(tag = %tag, "repository registered twice, keeping the latest");
        }
        self
    }

    pub fn get<R: Record>(&self, tag: &str) -> Result<Arc<dyn Repository<R>>, AppError> {
        self.repositories
            .get(tag)
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Repository<R>>>())
            .cloned()
            .ok_or_else(|| AppError::NotConfigured(format!("repository '{}'", tag)))
    }

    pub fn transactions(&self) -> Result<Arc<dyn Repository<Transaction>>, AppError> {
        self.get(Transaction::TAG)
    }

    pub fn payment_methods(&self) -> Result<Arc<dyn Repository<PaymentMethod>>, AppError> {
        self.get(PaymentMethod::TAG)
    }
}
