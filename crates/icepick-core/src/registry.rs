//! Resident module registry.
//!
//! A [`Session`] holds at most one instance per package name. Loads reach
//! the registry through [`Claim`]s:
//!
//! - a claim pins a slot while a load is in flight;
//! - the slot's cell is initialized at most once, so concurrent loads that
//!   need the same absent package share a single instantiation;
//! - a load that completes commits its claims and the slot stays resident;
//! - a load that fails or is dropped releases its claims, and a slot left
//!   with no claims is removed, along with any instance it holds.
//!
//! An interrupted initialization leaves the cell empty, so the next claimant
//! retries instead of observing a half-registered package.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use crate::types::{PackageName, Version};

/// A resident module and the concrete version it was instantiated from.
#[derive(Debug, Clone)]
pub struct Resident<M> {
    pub version: Version,
    pub module: M,
}

type Cell<M> = Arc<OnceCell<Resident<M>>>;

struct Slot<M> {
    cell: Cell<M>,
    claims: usize,
}

/// Page-session scoped registry of resident modules.
pub struct Session<M> {
    slots: Mutex<HashMap<PackageName, Slot<M>>>,
}

impl<M> Default for Session<M> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<M: Clone> fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("residents", &self.residents())
            .finish_non_exhaustive()
    }
}

impl<M: Clone> Session<M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PackageName, Slot<M>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a module that is already present in the page.
    ///
    /// Preloaded modules are never rolled back. Returns `false` if the name
    /// is already resident or being loaded.
    pub fn preload(&self, name: PackageName, version: Version, module: M) -> bool {
        let mut slots = self.slots();
        if slots.contains_key(name.as_str()) {
            return false;
        }
        let cell = OnceCell::new_with(Some(Resident { version, module }));
        slots.insert(
            name,
            Slot {
                cell: Arc::new(cell),
                claims: 1,
            },
        );
        true
    }

    /// The resident instance of `name`, if one has been instantiated.
    pub fn resident(&self, name: &str) -> Option<Resident<M>> {
        self.slots()
            .get(name)
            .and_then(|slot| slot.cell.get().cloned())
    }

    /// Resident package names and versions, sorted by name.
    pub fn residents(&self) -> Vec<(PackageName, Version)> {
        let mut out: Vec<_> = self
            .slots()
            .iter()
            .filter_map(|(name, slot)| {
                slot.cell
                    .get()
                    .map(|r| (name.clone(), r.version.clone()))
            })
            .collect();
        out.sort();
        out
    }

    /// Number of slots, including ones still being loaded.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Pin the slot for `name`, creating an empty one if needed.
    pub fn claim(&self, name: &PackageName) -> Claim<'_, M> {
        let mut slots = self.slots();
        let slot = slots.entry(name.clone()).or_insert_with(|| Slot {
            cell: Arc::new(OnceCell::new()),
            claims: 0,
        });
        slot.claims += 1;
        Claim {
            session: self,
            name: name.clone(),
            cell: Arc::clone(&slot.cell),
            committed: false,
        }
    }

    fn release(&self, name: &PackageName, cell: &Cell<M>) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(name.as_str()) else {
            return;
        };
        if !Arc::ptr_eq(&slot.cell, cell) {
            return;
        }
        slot.claims = slot.claims.saturating_sub(1);
        if slot.claims == 0 {
            slots.remove(name.as_str());
            tracing::debug!(%name, "rolled back registry slot");
        }
    }
}

/// A load's hold on one registry slot. Released on drop unless committed.
pub struct Claim<'a, M: Clone> {
    session: &'a Session<M>,
    name: PackageName,
    cell: Cell<M>,
    committed: bool,
}

impl<M: Clone> Claim<'_, M> {
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn cell(&self) -> &OnceCell<Resident<M>> {
        &self.cell
    }

    /// Keep the slot for the rest of the session.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<M: Clone> Drop for Claim<'_, M> {
    fn drop(&mut self) {
        if !self.committed {
            self.session.release(&self.name, &self.cell);
        }
    }
}

impl<M: Clone> fmt::Debug for Claim<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .field("committed", &self.committed)
            .finish()
    }
}
