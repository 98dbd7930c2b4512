use std::collections::BTreeSet;

use procem_model::{RunSlot, SlotLayout};
use tracing::debug;

use crate::{CoreError, engine::ContainerEngine};

/// A picked slot and how many slots were busy when it was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: RunSlot,
    pub in_use: usize,
}

/// Finds the smallest run slot not used by any running unit.
///
/// Liveness is derived from the engine's unit list on every call; nothing is cached.
/// Callers serialize `allocate` with unit creation (see [`crate::Launcher`]).
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    layout: SlotLayout,
}

impl SlotAllocator {
    pub fn new(layout: SlotLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Slots occupied by the given unit names. Names not matching the layout are ignored.
    pub fn in_use<'a, I>(&self, names: I) -> BTreeSet<RunSlot>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.layout.parse(name))
            .collect()
    }

    /// Smallest free slot, or `None` when every slot is occupied.
    pub fn pick(&self, in_use: &BTreeSet<RunSlot>) -> Option<RunSlot> {
        if in_use.is_empty() {
            return Some(RunSlot(0));
        }
        (0..self.layout.capacity())
            .map(RunSlot)
            .find(|slot| !in_use.contains(slot))
    }

    /// Query the engine and pick a slot.
    pub async fn allocate(&self, engine: &dyn ContainerEngine) -> Result<Allocation, CoreError> {
        let running = engine
            .list_running()
            .await
            .map_err(|source| CoreError::Engine {
                operation: "list",
                unit: "running units".to_string(),
                source,
                left_running: Vec::new(),
            })?;

        let in_use = self.in_use(running.iter().map(|u| u.name.as_str()));
        debug!(running = running.len(), slots_in_use = in_use.len(), "scanned running units");

        let slot = self.pick(&in_use).ok_or(CoreError::CapacityExhausted {
            capacity: self.layout.capacity(),
        })?;
        Ok(Allocation {
            slot,
            in_use: in_use.len(),
        })
    }
}
