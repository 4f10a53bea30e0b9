//! Shape keys and the factory-wide cache of synthesized proxy types.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::class::ClassType;
use crate::contract::Contract;
use crate::error::GenerationError;
use crate::generator::ProxyKind;
use crate::options::{GenerationOptions, OptionsKey};
use crate::proxy::ProxyType;

/// What a proxy type is built around.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseIdentity {
    /// The base class of a class proxy, by name
    Class(Arc<str>),
    /// The primary contract of a contract proxy, compared structurally
    Contract(Arc<Contract>),
}

/// The structural identity of a synthesis request.
///
/// Additional contracts are deduplicated and ordered by name, so the order
/// a caller lists them in does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    kind: ProxyKind,
    base: BaseIdentity,
    contracts: Vec<Arc<Contract>>,
    target: Option<Arc<str>>,
    options: OptionsKey,
}

impl ShapeKey {
    /// Builds the key of a request.
    pub fn new(
        kind: ProxyKind,
        base: BaseIdentity,
        additional: &[Arc<Contract>],
        target: Option<&Arc<ClassType>>,
        options: &GenerationOptions,
    ) -> Self {
        let mut contracts: Vec<Arc<Contract>> = additional.to_vec();
        contracts.sort_by(|a, b| a.name().cmp(b.name()));
        contracts.dedup();
        Self {
            kind,
            base,
            contracts,
            target: target.map(|t| Arc::clone(t.name_arc())),
            options: options.key(),
        }
    }

    /// Returns the proxy kind.
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// Returns the base identity.
    pub fn base(&self) -> &BaseIdentity {
        &self.base
    }
}

type Slot = Arc<OnceCell<Arc<ProxyType>>>;

/// Maps shape keys to synthesized proxy types.
///
/// Lookups take a read lock. A miss inserts a per-key cell under an
/// upgraded lock, then generates outside the map lock inside that cell, so
/// different shapes generate concurrently while one shape is generated at
/// most once. A cell whose generation failed stays empty and reads as
/// absent; the next request for that key generates again.
#[derive(Debug, Default)]
pub struct TypeCache {
    entries: RwLock<HashMap<ShapeKey, Slot>>,
}

impl TypeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached proxy type for `key`.
    pub fn get(&self, key: &ShapeKey) -> Option<Arc<ProxyType>> {
        self.entries
            .read()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Returns the cached proxy type for `key`, generating it with `factory`
    /// on a miss.
    ///
    /// # Errors
    ///
    /// Returns the factory's error. Nothing is cached in that case.
    pub fn get_or_create<F>(&self, key: &ShapeKey, factory: F) -> Result<Arc<ProxyType>, GenerationError>
    where
        F: FnOnce() -> Result<ProxyType, GenerationError>,
    {
        if let Some(hit) = self.get(key) {
            tracing::trace!(kind = ?key.kind, "proxy type cache hit");
            return Ok(hit);
        }

        let slot = self.slot_for(key);
        let mut generated = false;
        let result = slot
            .get_or_try_init(|| {
                generated = true;
                factory().map(Arc::new)
            })
            .map(Arc::clone);
        match &result {
            Ok(ty) if generated => tracing::trace!(proxy = %ty.name(), "proxy type cache miss"),
            Ok(_) => {}
            Err(e) => tracing::warn!(kind = ?key.kind, error = %e, "proxy type generation failed"),
        }
        result
    }

    fn slot_for(&self, key: &ShapeKey) -> Slot {
        let entries = self.entries.upgradable_read();
        if let Some(slot) = entries.get(key) {
            return Arc::clone(slot);
        }
        let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Returns true if a proxy type is cached for `key`.
    pub fn contains(&self, key: &ShapeKey) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of cached proxy types.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached proxy type. Proxies already created keep theirs.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
