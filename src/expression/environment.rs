//! Binding environment for expression trees.

use super::qualifier::ControlQualifier;
use super::suppression::HotkeySuppressions;
use crate::ControlState;
use crate::device::{DeviceContainer, DeviceQualifier, Input, InputId, Output};
use crate::runtime::{AtomicF64, InputRuntime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named mutable value shared by every `$name` node bound to the same
/// environment.
#[derive(Debug, Default)]
pub struct VariableCell {
    value: AtomicF64,
}

impl VariableCell {
    pub fn get(&self) -> ControlState {
        self.value.load()
    }

    pub fn set(&self, value: ControlState) {
        self.value.store(value);
    }
}

/// Everything a tree needs to resolve its references: the device set, the
/// default device for bare control names, the variable cells of one
/// controller profile, plus the runtime and suppression table handed to nodes.
///
/// One environment exists per controller profile. Variable cells are created
/// lazily on first lookup and shared through `Arc`; they outlive any single
/// node and are reclaimed by [`ControlEnvironment::clean_unused_variables`].
#[derive(Debug)]
pub struct ControlEnvironment {
    devices: Arc<DeviceContainer>,
    default_device: DeviceQualifier,
    variables: HashMap<String, Arc<VariableCell>>,
    runtime: Arc<InputRuntime>,
    suppressions: Arc<HotkeySuppressions>,
}

impl ControlEnvironment {
    pub fn new(
        devices: Arc<DeviceContainer>,
        default_device: DeviceQualifier,
        runtime: Arc<InputRuntime>,
        suppressions: Arc<HotkeySuppressions>,
    ) -> Self {
        Self { devices, default_device, variables: HashMap::new(), runtime, suppressions }
    }

    pub fn devices(&self) -> &Arc<DeviceContainer> {
        &self.devices
    }

    pub fn default_device(&self) -> &DeviceQualifier {
        &self.default_device
    }

    pub fn set_default_device(&mut self, device: DeviceQualifier) {
        self.default_device = device;
    }

    pub fn runtime(&self) -> &Arc<InputRuntime> {
        &self.runtime
    }

    pub fn suppressions(&self) -> &Arc<HotkeySuppressions> {
        &self.suppressions
    }

    pub fn find_input(&self, qualifier: &ControlQualifier) -> Option<(InputId, Arc<dyn Input>)> {
        self.devices.find_input(qualifier, &self.default_device)
    }

    pub fn find_output(&self, qualifier: &ControlQualifier) -> Option<Arc<dyn Output>> {
        self.devices.find_output(qualifier, &self.default_device)
    }

    /// Fetch the cell named `name`, creating it on first use.
    pub fn variable(&mut self, name: &str) -> Arc<VariableCell> {
        self.variables.entry(name.to_string()).or_default().clone()
    }

    /// Current value of a variable without creating it.
    pub fn variable_value(&self, name: &str) -> Option<ControlState> {
        self.variables.get(name).map(|cell| cell.get())
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Drop cells no node holds any more. Returns how many were dropped.
    pub fn clean_unused_variables(&mut self) -> usize {
        let before = self.variables.len();
        self.variables.retain(|_, cell| Arc::strong_count(cell) > 1);
        let dropped = before - self.variables.len();
        if dropped > 0 {
            debug!("Swept {} unused expression variables", dropped);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeOptions;

    fn environment() -> ControlEnvironment {
        let (runtime, _clock) = InputRuntime::manual(RuntimeOptions::default());
        ControlEnvironment::new(
            Arc::new(DeviceContainer::new()),
            DeviceQualifier::default(),
            runtime,
            Arc::new(HotkeySuppressions::new()),
        )
    }

    #[test]
    fn variables_are_shared_by_name() {
        let mut env = environment();
        let a = env.variable("speed");
        let b = env.variable("speed");
        a.set(0.25);
        assert_eq!(b.get(), 0.25);
        assert_eq!(env.variable_value("speed"), Some(0.25));
        assert_eq!(env.variable_value("other"), None);
    }

    #[test]
    fn sweep_only_drops_unheld_cells() {
        let mut env = environment();
        let held = env.variable("held");
        drop(env.variable("dropped"));
        assert_eq!(env.variable_count(), 2);

        assert_eq!(env.clean_unused_variables(), 1);
        assert_eq!(env.variable_count(), 1);
        held.set(1.0);
        assert_eq!(env.variable_value("held"), Some(1.0));

        drop(held);
        assert_eq!(env.clean_unused_variables(), 1);
        assert_eq!(env.variable_count(), 0);
    }
}
