use std::sync::Arc;

use crate::shared::SlotId;

use super::project::{Pattern, TrackPatch};

// All four slots plus which one is being edited/played. Patterns sit behind
// Arcs and are never mutated in place: every edit builds a new Pattern and
// swaps it in, so a snapshot taken by the scheduler stays consistent.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternStore {
    slots: [Arc<Pattern>; 4],
    active: SlotId,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Arc::new(Pattern::default())),
            active: SlotId::A,
        }
    }
}

impl PatternStore {
    pub fn from_patterns(patterns: impl IntoIterator<Item = (SlotId, Pattern)>, active: SlotId) -> Self {
        let mut store = Self { active, ..Self::default() };
        for (slot, pattern) in patterns {
            store.slots[slot.index()] = Arc::new(pattern.normalized());
        }
        store
    }

    pub fn active_slot(&self) -> SlotId {
        self.active
    }

    pub fn active_pattern(&self) -> Arc<Pattern> {
        self.pattern(self.active)
    }

    pub fn pattern(&self, slot: SlotId) -> Arc<Pattern> {
        self.slots[slot.index()].clone()
    }

    pub fn set_active_slot(&mut self, slot: SlotId) {
        self.active = slot;
    }

    pub fn set_pattern(&mut self, slot: SlotId, pattern: Pattern) {
        self.slots[slot.index()] = Arc::new(pattern.normalized());
    }

    /// Applies `patch` to one track of the active pattern.
    pub fn set_track(&mut self, track: usize, patch: &TrackPatch) {
        let next = self.active_pattern().with_track(track, patch);
        self.slots[self.active.index()] = Arc::new(next);
    }

    pub fn toggle_step(&mut self, track: usize, step: usize) {
        let next = self.active_pattern().with_step_toggled(track, step);
        self.slots[self.active.index()] = Arc::new(next);
    }

    pub fn reset_slot(&mut self, slot: SlotId) {
        self.slots[slot.index()] = Arc::new(Pattern::default());
    }

    pub fn reset_all(&mut self) {
        for slot in SlotId::ALL {
            self.reset_slot(slot);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &Arc<Pattern>)> {
        SlotId::ALL.into_iter().zip(self.slots.iter())
    }
}
