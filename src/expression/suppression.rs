//! Hotkey suppression table.
//!
//! While a hotkey such as `@(Ctrl+A)` is armed (all of its modifiers held) it
//! registers one `(final input, modifier)` pair per modifier here. Every plain
//! control read consults the table, so a mapping bound to just `A` reads 0 for
//! as long as the modified hotkey owns the key.
//!
//! Registrations are reference-counted: two hotkeys sharing a pair keep it
//! alive until both release it. A registration is owned by a [`Suppressor`]
//! guard and released exactly once, on drop.
//!
//! The table is keyed by [`InputId`] (device id + input index), never by
//! pointers, so a disconnected device cannot leave dangling entries behind.

use crate::device::InputId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

type Modifiers = HashMap<InputId, usize>;

/// `final input -> (modifier -> active count)`.
#[derive(Debug, Default)]
pub struct HotkeySuppressions {
    table: Mutex<HashMap<InputId, Modifiers>>,
}

impl HotkeySuppressions {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<InputId, Modifiers>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if any armed hotkey uses `input` as its final input.
    pub fn is_suppressed(&self, input: InputId) -> bool {
        self.table().get(&input).is_some_and(|mods| !mods.is_empty())
    }

    /// True if `input` is claimed by a hotkey with at least one modifier that
    /// is not in `ignore`.
    ///
    /// A hotkey asks this about its own final input while passing its own
    /// modifiers, so its own registration and those of less specific hotkeys
    /// never block it; only a hotkey with extra modifiers does.
    pub fn is_suppressed_ignoring_modifiers(&self, input: InputId, ignore: &[InputId]) -> bool {
        self.table().get(&input).is_some_and(|mods| mods.keys().any(|m| !ignore.contains(m)))
    }

    /// Number of active registrations of the `(final_input, modifier)` pair.
    pub fn active_count(&self, final_input: InputId, modifier: InputId) -> usize {
        self.table().get(&final_input).and_then(|mods| mods.get(&modifier)).copied().unwrap_or(0)
    }

    /// Register every `(final_input, modifier)` pair and return the guard that
    /// releases them.
    pub fn make_suppressor(self: &Arc<Self>, final_input: InputId, modifiers: &[InputId]) -> Suppressor {
        {
            let mut table = self.table();
            let entry = table.entry(final_input).or_default();
            for modifier in modifiers {
                *entry.entry(*modifier).or_insert(0) += 1;
            }
        }
        trace!("Hotkey suppression armed: final={:?} modifiers={:?}", final_input, modifiers);
        Suppressor { table: Arc::clone(self), final_input, modifiers: modifiers.to_vec() }
    }

    fn release(&self, final_input: InputId, modifiers: &[InputId]) {
        let mut table = self.table();
        if let Some(entry) = table.get_mut(&final_input) {
            for modifier in modifiers {
                if let Some(count) = entry.get_mut(modifier) {
                    *count -= 1;
                    if *count == 0 {
                        entry.remove(modifier);
                    }
                }
            }
            if entry.is_empty() {
                table.remove(&final_input);
            }
        }
        trace!("Hotkey suppression released: final={:?} modifiers={:?}", final_input, modifiers);
    }
}

/// Owns one hotkey's registrations; dropping it releases them.
pub struct Suppressor {
    table: Arc<HotkeySuppressions>,
    final_input: InputId,
    modifiers: Vec<InputId>,
}

impl fmt::Debug for Suppressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suppressor").field("final_input", &self.final_input).field("modifiers", &self.modifiers).finish()
    }
}

impl Drop for Suppressor {
    fn drop(&mut self) {
        self.table.release(self.final_input, &self.modifiers);
    }
}
