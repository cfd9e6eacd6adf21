//! Device backend interface.
//!
//! The driver layer is external to this crate: it only has to expose devices
//! with named, numeric-valued inputs and outputs. [`DeviceContainer`] keeps the
//! live set, assigns stable ids and resolves [`ControlQualifier`]s against it.
//! [`VirtualDevice`] is an in-memory backend for tests, tools and scripting.
//!
//! [`ControlQualifier`]: crate::ControlQualifier

use crate::ControlState;
use crate::error::QualifierError;
use crate::expression::ControlQualifier;
use crate::runtime::AtomicF64;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// A named value read from a device (button, axis half, key, ...).
pub trait Input: Send + Sync {
    fn name(&self) -> String;

    /// Current raw state. May be negative or exceed 1.
    fn state(&self) -> ControlState;

    fn is_matching_name(&self, name: &str) -> bool {
        self.name() == name
    }
}

/// A named value written to a device (rumble motor, LED, ...).
pub trait Output: Send + Sync {
    fn name(&self) -> String;

    fn set_state(&self, state: ControlState);

    fn is_matching_name(&self, name: &str) -> bool {
        self.name() == name
    }
}

/// A physical or virtual device exposed by a backend.
pub trait Device: Send + Sync {
    /// Backend name, e.g. `"SDL"` or `"XInput"`.
    fn source(&self) -> String;

    /// Device name as reported by the backend.
    fn name(&self) -> String;

    fn inputs(&self) -> &[Arc<dyn Input>];

    fn outputs(&self) -> &[Arc<dyn Output>];
}

/// `source/id/name` triple identifying a device in configuration strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceQualifier {
    pub source: String,
    /// Ordinal among connected devices sharing `source` and `name`.
    pub id: u32,
    pub name: String,
}

impl DeviceQualifier {
    pub fn new(source: impl Into<String>, id: u32, name: impl Into<String>) -> Self {
        Self { source: source.into(), id, name: name.into() }
    }
}

impl fmt::Display for DeviceQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() && self.name.is_empty() {
            return Ok(());
        }
        write!(f, "{}/{}/{}", self.source, self.id, self.name)
    }
}

impl FromStr for DeviceQualifier {
    type Err = QualifierError;

    /// Parse `source/id/name`. The name may itself contain `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(source), Some(id), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(QualifierError::MissingPart(s.to_string()));
        };
        let id = id
            .parse::<u32>()
            .map_err(|_| QualifierError::InvalidId { qualifier: s.to_string(), id: id.to_string() })?;
        Ok(Self::new(source, id, name))
    }
}

/// Stable identity of a device for as long as it stays connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

/// Stable identity of one input: owning device plus index into its input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId {
    pub device: DeviceId,
    pub index: usize,
}

#[derive(Clone)]
struct DeviceEntry {
    id: DeviceId,
    qualifier: DeviceQualifier,
    device: Arc<dyn Device>,
}

/// The live set of connected devices.
///
/// Adding or removing a device does not touch any bound expression; the owner
/// is expected to call `update_references` on every profile afterwards.
#[derive(Default)]
pub struct DeviceContainer {
    devices: RwLock<Vec<DeviceEntry>>,
    next_id: AtomicU64,
}

impl fmt::Debug for DeviceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContainer").field("devices", &self.qualifiers()).finish()
    }
}

impl DeviceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return its qualifier.
    ///
    /// The ordinal part of the qualifier is the lowest one not already taken by
    /// a device with the same source and name.
    pub fn add_device(&self, device: Arc<dyn Device>) -> DeviceQualifier {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let (source, name) = (device.source(), device.name());

        let mut ordinal = 0;
        while devices.iter().any(|d| d.qualifier.source == source && d.qualifier.name == name && d.qualifier.id == ordinal)
        {
            ordinal += 1;
        }

        let qualifier = DeviceQualifier::new(source, ordinal, name);
        let id = DeviceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!("Device connected: {} ({} inputs, {} outputs)", qualifier, device.inputs().len(), device.outputs().len());
        devices.push(DeviceEntry { id, qualifier: qualifier.clone(), device });
        qualifier
    }

    /// Remove a device. Returns false if it was not connected.
    pub fn remove_device(&self, qualifier: &DeviceQualifier) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let before = devices.len();
        devices.retain(|d| &d.qualifier != qualifier);
        let removed = devices.len() != before;
        if removed {
            info!("Device disconnected: {}", qualifier);
        }
        removed
    }

    pub fn qualifiers(&self) -> Vec<DeviceQualifier> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).iter().map(|d| d.qualifier.clone()).collect()
    }

    pub fn find_device(&self, qualifier: &DeviceQualifier) -> Option<(DeviceId, Arc<dyn Device>)> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| &d.qualifier == qualifier)
            .map(|d| (d.id, d.device.clone()))
    }

    /// Resolve a control to a live input. `default_device` is used when the
    /// qualifier does not name one.
    pub fn find_input(
        &self,
        qualifier: &ControlQualifier,
        default_device: &DeviceQualifier,
    ) -> Option<(InputId, Arc<dyn Input>)> {
        let device_qualifier = qualifier.device.as_ref().unwrap_or(default_device);
        let (device_id, device) = self.find_device(device_qualifier)?;
        let found = device
            .inputs()
            .iter()
            .enumerate()
            .find(|(_, input)| input.is_matching_name(&qualifier.control_name))
            .map(|(index, input)| (InputId { device: device_id, index }, input.clone()));
        if found.is_none() {
            debug!("Input '{}' not found on {}", qualifier.control_name, device_qualifier);
        }
        found
    }

    /// Resolve a control to a live output.
    pub fn find_output(
        &self,
        qualifier: &ControlQualifier,
        default_device: &DeviceQualifier,
    ) -> Option<Arc<dyn Output>> {
        let device_qualifier = qualifier.device.as_ref().unwrap_or(default_device);
        let (_, device) = self.find_device(device_qualifier)?;
        device.outputs().iter().find(|output| output.is_matching_name(&qualifier.control_name)).cloned()
    }
}

// --- Virtual backend ---------------------------------------------------------

/// An input whose state is set by the caller.
#[derive(Debug, Default)]
pub struct VirtualInput {
    name: String,
    state: AtomicF64,
}

impl VirtualInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: AtomicF64::new(0.0) }
    }

    pub fn set(&self, state: ControlState) {
        self.state.store(state);
    }
}

impl Input for VirtualInput {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn state(&self) -> ControlState {
        self.state.load()
    }
}

/// An output that remembers the last value written to it.
#[derive(Debug, Default)]
pub struct VirtualOutput {
    name: String,
    state: AtomicF64,
}

impl VirtualOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: AtomicF64::new(0.0) }
    }

    pub fn get(&self) -> ControlState {
        self.state.load()
    }
}

impl Output for VirtualOutput {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_state(&self, state: ControlState) {
        self.state.store(state);
    }
}

/// An in-memory device built from named inputs and outputs.
pub struct VirtualDevice {
    source: String,
    name: String,
    inputs: Vec<Arc<dyn Input>>,
    outputs: Vec<Arc<dyn Output>>,
    virtual_inputs: Vec<Arc<VirtualInput>>,
    virtual_outputs: Vec<Arc<VirtualOutput>>,
}

impl fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("source", &self.source)
            .field("name", &self.name)
            .field("inputs", &self.virtual_inputs)
            .field("outputs", &self.virtual_outputs)
            .finish()
    }
}

impl VirtualDevice {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            virtual_inputs: Vec::new(),
            virtual_outputs: Vec::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let input = Arc::new(VirtualInput::new(name));
            self.inputs.push(input.clone());
            self.virtual_inputs.push(input);
        }
        self
    }

    pub fn with_outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let output = Arc::new(VirtualOutput::new(name));
            self.outputs.push(output.clone());
            self.virtual_outputs.push(output);
        }
        self
    }

    /// Handle to a named input, for driving it from the outside.
    pub fn input(&self, name: &str) -> Option<Arc<VirtualInput>> {
        self.virtual_inputs.iter().find(|i| i.name == name).cloned()
    }

    pub fn output(&self, name: &str) -> Option<Arc<VirtualOutput>> {
        self.virtual_outputs.iter().find(|o| o.name == name).cloned()
    }
}

impl Device for VirtualDevice {
    fn source(&self) -> String {
        self.source.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn inputs(&self) -> &[Arc<dyn Input>] {
        &self.inputs
    }

    fn outputs(&self) -> &[Arc<dyn Output>] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_qualifier_round_trips_through_text() {
        let q: DeviceQualifier = "SDL/1/Xbox Controller/Wireless".parse().unwrap();
        assert_eq!(q.source, "SDL");
        assert_eq!(q.id, 1);
        assert_eq!(q.name, "Xbox Controller/Wireless");
        assert_eq!(q.to_string(), "SDL/1/Xbox Controller/Wireless");
    }

    #[test]
    fn device_qualifier_rejects_malformed_text() {
        assert_eq!("Keyboard".parse::<DeviceQualifier>(), Err(QualifierError::MissingPart("Keyboard".into())));
        assert!(matches!("SDL/x/Pad".parse::<DeviceQualifier>(), Err(QualifierError::InvalidId { .. })));
    }

    #[test]
    fn container_assigns_lowest_free_ordinal() {
        let container = DeviceContainer::new();
        let a = container.add_device(Arc::new(VirtualDevice::new("Virtual", "Pad")));
        let b = container.add_device(Arc::new(VirtualDevice::new("Virtual", "Pad")));
        assert_eq!((a.id, b.id), (0, 1));

        assert!(container.remove_device(&a));
        assert!(!container.remove_device(&a));
        let c = container.add_device(Arc::new(VirtualDevice::new("Virtual", "Pad")));
        assert_eq!(c.id, 0);
    }

    #[test]
    fn find_input_uses_default_device_and_stable_ids() {
        let container = DeviceContainer::new();
        let pad = container.add_device(Arc::new(VirtualDevice::new("Virtual", "Pad").with_inputs(["A", "B"])));
        let kb = container.add_device(Arc::new(VirtualDevice::new("Virtual", "Keys").with_inputs(["B"])));

        let (id_b, _) = container.find_input(&ControlQualifier::bare("B"), &pad).unwrap();
        assert_eq!(id_b.index, 1);

        let qualified = ControlQualifier { device: Some(kb.clone()), control_name: "B".into() };
        let (id_kb, _) = container.find_input(&qualified, &pad).unwrap();
        assert_ne!(id_kb.device, id_b.device);
        assert_eq!(id_kb.index, 0);

        assert!(container.find_input(&ControlQualifier::bare("Missing"), &pad).is_none());
        assert!(container.find_output(&ControlQualifier::bare("A"), &pad).is_none());
    }
}
