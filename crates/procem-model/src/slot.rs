use std::fmt;

use serde::{Deserialize, Serialize};

/// Default literal that starts every unit name of a run.
pub const DEFAULT_SLOT_PREFIX: &str = "Sim";
/// Default number of digits used for the slot index.
pub const DEFAULT_SLOT_WIDTH: u32 = 2;

/// Small integer identifying one active run on the platform.
///
/// A slot is never stored anywhere: it lives only as the numeric part of the
/// name prefix that every unit of the run carries (`Sim07_...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunSlot(pub u32);

impl fmt::Display for RunSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Naming scheme shared by the allocator (scan side) and the launcher (create side).
///
/// Prefix `"Sim"`, width 2 and slot 7 give `"Sim07_"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    prefix: String,
    width: u32,
}

impl SlotLayout {
    /// Create a layout. `width` is clamped to `1..=9` so the capacity fits in `u32`.
    pub fn new(prefix: impl Into<String>, width: u32) -> Self {
        Self {
            prefix: prefix.into(),
            width: width.clamp(1, 9),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of distinct slots, `10^width`. Hard limit on concurrent runs.
    pub fn capacity(&self) -> u32 {
        10u32.pow(self.width)
    }

    /// Zero-padded slot index, e.g. `"07"`.
    pub fn label(&self, slot: RunSlot) -> String {
        format!("{:0width$}", slot.0, width = self.width as usize)
    }

    /// Full unit name prefix for a slot, e.g. `"Sim07_"`.
    pub fn name_prefix(&self, slot: RunSlot) -> String {
        format!("{}{}_", self.prefix, self.label(slot))
    }

    /// Slot-prefixed unit name.
    pub fn unit_name(&self, slot: RunSlot, name: &str) -> String {
        let mut full = self.name_prefix(slot);
        full.push_str(name);
        full
    }

    /// Extract the slot from a unit name.
    ///
    /// Matches only `<prefix><exactly width digits>_` at the start of the name.
    pub fn parse(&self, unit_name: &str) -> Option<RunSlot> {
        let rest = unit_name.strip_prefix(self.prefix.as_str())?;
        let width = self.width as usize;
        let digits = rest.get(..width)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if rest.as_bytes().get(width) != Some(&b'_') {
            return None;
        }
        digits.parse().ok().map(RunSlot)
    }

    /// Whether the unit name belongs to the given slot.
    pub fn owns(&self, slot: RunSlot, unit_name: &str) -> bool {
        self.parse(unit_name) == Some(slot)
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_PREFIX, DEFAULT_SLOT_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_zero_padded() {
        let layout = SlotLayout::default();
        assert_eq!(layout.name_prefix(RunSlot(7)), "Sim07_");
        assert_eq!(layout.unit_name(RunSlot(42), "Manager"), "Sim42_Manager");
        assert_eq!(layout.label(RunSlot(0)), "00");
        assert_eq!(layout.capacity(), 100);
    }

    #[test]
    fn parse_accepts_exact_pattern_only() {
        let layout = SlotLayout::default();
        assert_eq!(layout.parse("Sim00_log_writer"), Some(RunSlot(0)));
        assert_eq!(layout.parse("Sim99_"), Some(RunSlot(99)));

        assert_eq!(layout.parse("Sim1_x"), None);
        assert_eq!(layout.parse("Sim123_x"), None);
        assert_eq!(layout.parse("sim01_x"), None);
        assert_eq!(layout.parse("Run01_x"), None);
        assert_eq!(layout.parse("Sim01x_"), None);
        assert_eq!(layout.parse("Sim01"), None);
        assert_eq!(layout.parse("xSim01_a"), None);
        assert_eq!(layout.parse("Sim0a_x"), None);
    }

    #[test]
    fn parse_respects_custom_layout() {
        let layout = SlotLayout::new("Run", 3);
        assert_eq!(layout.parse("Run012_worker"), Some(RunSlot(12)));
        assert_eq!(layout.parse("Run12_worker"), None);
        assert_eq!(layout.capacity(), 1000);
        assert!(layout.owns(RunSlot(12), "Run012_a"));
        assert!(!layout.owns(RunSlot(13), "Run012_a"));
    }

    #[test]
    fn parse_does_not_panic_on_multibyte_names() {
        let layout = SlotLayout::default();
        assert_eq!(layout.parse("Simé_x"), None);
        assert_eq!(layout.parse("Sim0é"), None);
    }
}
