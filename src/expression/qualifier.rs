use crate::device::DeviceQualifier;
use std::fmt;

/// A reference to one control, optionally pinned to a device.
///
/// Text form is `device:control` (device as `source/id/name`) or a bare
/// control name, which resolves against the environment's default device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ControlQualifier {
    pub device: Option<DeviceQualifier>,
    pub control_name: String,
}

impl ControlQualifier {
    /// A control on the default device.
    pub fn bare(control_name: impl Into<String>) -> Self {
        Self { device: None, control_name: control_name.into() }
    }

    /// Split `text` at the first `:`.
    ///
    /// If the part before the colon is not a valid device qualifier the whole
    /// text is kept as the control name, so names containing `:` still work
    /// against the default device.
    pub fn parse(text: &str) -> Self {
        if let Some((device, control)) = text.split_once(':') {
            if let Ok(device) = device.parse::<DeviceQualifier>() {
                return Self { device: Some(device), control_name: control.to_string() };
            }
        }
        Self::bare(text)
    }
}

impl fmt::Display for ControlQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}:{}", device, self.control_name),
            None => f.write_str(&self.control_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_and_bare_forms() {
        let q = ControlQualifier::parse("XInput/0/Gamepad:Button A");
        assert_eq!(q.device, Some(DeviceQualifier::new("XInput", 0, "Gamepad")));
        assert_eq!(q.control_name, "Button A");
        assert_eq!(q.to_string(), "XInput/0/Gamepad:Button A");

        assert_eq!(ControlQualifier::parse("Button A"), ControlQualifier::bare("Button A"));
    }

    #[test]
    fn colon_without_device_stays_in_name() {
        let q = ControlQualifier::parse("Axis:X+");
        assert_eq!(q, ControlQualifier::bare("Axis:X+"));
    }
}
