//! Bound mappings and the per-profile configuration lock.
//!
//! A [`ControlReference`] is one mapping slot of an emulated controller: the
//! text the user typed, the tree parsed from it and a range multiplier. A
//! [`MappingProfile`] owns every reference of one controller together with the
//! [`ControlEnvironment`] they are bound against, behind a single mutex. The
//! polling thread and the configuration side (edits, reloads, hot-plug) both go
//! through that lock, so a rebuild only ever blocks polling for its own length.

use crate::api::{ParseStatus, parse_expression};
use crate::error::ParseError;
use crate::expression::{ControlEnvironment, Expression};
use crate::runtime::InputRuntime;
use crate::{ControlState, FocusFlags, is_pressed};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Reads device inputs (buttons, sticks).
    Input,
    /// Drives device outputs (rumble).
    Output,
}

/// One mapping slot.
#[derive(Debug)]
pub struct ControlReference {
    kind: ReferenceKind,
    expression: String,
    status: ParseStatus,
    tree: Option<Expression>,
    /// Multiplier applied to reads and writes.
    pub range: ControlState,
    blocked_by_focus_change: bool,
}

impl ControlReference {
    pub fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            expression: String::new(),
            status: ParseStatus::EmptyExpression,
            tree: None,
            range: 1.0,
            blocked_by_focus_change: false,
        }
    }

    pub fn input() -> Self {
        Self::new(ReferenceKind::Input)
    }

    pub fn output() -> Self {
        Self::new(ReferenceKind::Output)
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn status(&self) -> ParseStatus {
        self.status
    }

    pub fn tree(&self) -> Option<&Expression> {
        self.tree.as_ref()
    }

    /// Replace the expression.
    ///
    /// On a syntax error the bareword fallback is still installed, so a
    /// mapping like `Button A` keeps working, and the diagnostic is returned.
    /// Call [`ControlReference::update_reference`] afterwards to bind it.
    pub fn set_expression(&mut self, text: &str) -> Result<(), ParseError> {
        let result = parse_expression(text);
        self.expression = text.to_string();
        self.status = result.status;
        self.tree = result.expr;
        self.blocked_by_focus_change = false;
        match result.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn update_reference(&mut self, env: &mut ControlEnvironment) {
        if let Some(tree) = &mut self.tree {
            tree.update_references(env);
        }
    }

    /// Number of real controls the expression is bound to.
    pub fn bound_count(&self) -> usize {
        self.tree.as_ref().map_or(0, Expression::count_num_controls)
    }

    pub fn focus_flags(&self) -> FocusFlags {
        self.tree.as_ref().map_or(FocusFlags::empty(), Expression::focus_flags)
    }

    /// Evaluate an input reference for this poll, scaled by `range`.
    ///
    /// The tree is evaluated even while focus gates the result to 0, so
    /// stateful functions keep their notion of time.
    pub fn state(&mut self, runtime: &InputRuntime) -> ControlState {
        let Some(tree) = &mut self.tree else {
            return 0.0;
        };
        let flags = tree.focus_flags();
        let value = tree.get_value();

        if runtime.background_input() {
            self.blocked_by_focus_change = false;
            return value * self.range;
        }

        let gate_open = (!flags.contains(FocusFlags::REQUIRE_FOCUS) || runtime.has_focus())
            && (!flags.contains(FocusFlags::REQUIRE_FULL_FOCUS) || runtime.has_full_focus());

        if !gate_open {
            if flags.contains(FocusFlags::IGNORE_ON_FOCUS_CHANGED) {
                self.blocked_by_focus_change = true;
            }
            return 0.0;
        }
        if self.blocked_by_focus_change {
            if is_pressed(value) {
                return 0.0;
            }
            self.blocked_by_focus_change = false;
        }
        value * self.range
    }

    /// Drive an output reference.
    pub fn set_state(&mut self, value: ControlState) {
        if let Some(tree) = &mut self.tree {
            tree.set_value(value * self.range);
        }
    }
}

/// All references of one controller plus the environment they bind against.
#[derive(Debug)]
pub struct ProfileState {
    env: ControlEnvironment,
    references: BTreeMap<String, ControlReference>,
}

impl ProfileState {
    pub fn env(&self) -> &ControlEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut ControlEnvironment {
        &mut self.env
    }

    /// Parse, bind and store a reference under `name`, replacing any previous
    /// one. The reference is stored even when the expression has a syntax
    /// error.
    pub fn bind(&mut self, name: &str, kind: ReferenceKind, expression: &str) -> Result<(), ParseError> {
        let mut reference = ControlReference::new(kind);
        let result = reference.set_expression(expression);
        reference.update_reference(&mut self.env);
        if let Err(error) = &result {
            warn!("Mapping '{}' has a syntax error: {}", name, error);
        }
        self.references.insert(name.to_string(), reference);
        result
    }

    pub fn unbind(&mut self, name: &str) -> bool {
        self.references.remove(name).is_some()
    }

    pub fn reference(&self, name: &str) -> Option<&ControlReference> {
        self.references.get(name)
    }

    pub fn reference_mut(&mut self, name: &str) -> Option<&mut ControlReference> {
        self.references.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(String::as_str)
    }

    /// Rebind every reference, e.g. after a device was connected or removed.
    pub fn update_references(&mut self) {
        for reference in self.references.values_mut() {
            reference.update_reference(&mut self.env);
        }
        let bound = self.references.values().filter(|r| r.bound_count() > 0).count();
        debug!("Rebound {} references ({} resolved)", self.references.len(), bound);
    }

    /// Evaluate one input reference.
    pub fn state(&mut self, name: &str) -> Option<ControlState> {
        let runtime = self.env.runtime();
        self.references.get_mut(name).filter(|r| r.kind == ReferenceKind::Input).map(|r| r.state(runtime))
    }

    /// Evaluate every input reference once, in name order.
    pub fn poll(&mut self) -> BTreeMap<String, ControlState> {
        let runtime = self.env.runtime();
        self.references
            .iter_mut()
            .filter(|(_, r)| r.kind == ReferenceKind::Input)
            .map(|(name, r)| (name.clone(), r.state(runtime)))
            .collect()
    }

    /// Write to an output reference. Returns false if there is none by that name.
    pub fn set_output(&mut self, name: &str, value: ControlState) -> bool {
        match self.references.get_mut(name) {
            Some(reference) if reference.kind == ReferenceKind::Output => {
                reference.set_state(value);
                true
            }
            _ => false,
        }
    }

    /// Drop variable cells no longer referenced by any tree.
    pub fn sweep(&mut self) -> usize {
        self.env.clean_unused_variables()
    }
}

/// The coarse "controller configuration" lock.
#[derive(Debug)]
pub struct MappingProfile {
    state: Mutex<ProfileState>,
}

impl MappingProfile {
    pub fn new(env: ControlEnvironment) -> Self {
        Self { state: Mutex::new(ProfileState { env, references: BTreeMap::new() }) }
    }

    /// Lock the profile. A poisoned lock is recovered: reference state is
    /// rebuilt on the next rebind anyway.
    pub fn lock(&self) -> MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceContainer, VirtualDevice};
    use crate::expression::HotkeySuppressions;
    use crate::runtime::RuntimeOptions;
    use std::sync::Arc;

    struct Rig {
        profile: MappingProfile,
        runtime: Arc<InputRuntime>,
        pad: Arc<VirtualDevice>,
        devices: Arc<DeviceContainer>,
    }

    fn rig() -> Rig {
        let (runtime, _clock) = InputRuntime::manual(RuntimeOptions::default());
        let devices = Arc::new(DeviceContainer::new());
        let pad = Arc::new(VirtualDevice::new("Virtual", "Pad").with_inputs(["A", "B"]).with_outputs(["Motor"]));
        let qualifier = devices.add_device(pad.clone());
        let suppressions = Arc::new(HotkeySuppressions::new());
        let env = ControlEnvironment::new(devices.clone(), qualifier, runtime.clone(), suppressions);
        Rig { profile: MappingProfile::new(env), runtime, pad, devices }
    }

    #[test]
    fn range_scales_reads_and_writes() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("a", ReferenceKind::Input, "A").unwrap();
        profile.bind("rumble", ReferenceKind::Output, "Motor").unwrap();
        profile.reference_mut("a").unwrap().range = 0.5;
        profile.reference_mut("rumble").unwrap().range = 0.5;

        rig.pad.input("A").unwrap().set(1.0);
        assert_eq!(profile.state("a"), Some(0.5));
        assert!(profile.set_output("rumble", 0.8));
        assert_eq!(rig.pad.output("Motor").unwrap().get(), 0.4);
        assert!(!profile.set_output("a", 1.0));
    }

    #[test]
    fn syntax_errors_still_bind_the_bareword() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        let err = profile.bind("a", ReferenceKind::Input, "A B").unwrap_err();
        assert_eq!(err.description, "Expected end of input.");
        let reference = profile.reference("a").unwrap();
        assert_eq!(reference.status(), ParseStatus::SyntaxError);
        assert_eq!(reference.expression(), "A B");
        assert_eq!(reference.bound_count(), 0);
    }

    #[test]
    fn focus_gates_device_reads_but_not_constants() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("a", ReferenceKind::Input, "A").unwrap();
        profile.bind("constant", ReferenceKind::Input, "0.75").unwrap();
        profile.bind("always", ReferenceKind::Input, "ignoreFocus(A)").unwrap();
        rig.pad.input("A").unwrap().set(1.0);

        rig.runtime.set_focus(false);
        let values = profile.poll();
        assert_eq!(values["a"], 0.0);
        assert_eq!(values["constant"], 0.75);
        assert_eq!(values["always"], 1.0);

        rig.runtime.set_background_input(true);
        assert_eq!(profile.state("a"), Some(1.0));
    }

    #[test]
    fn regained_focus_waits_for_release() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("a", ReferenceKind::Input, "A").unwrap();
        let a = rig.pad.input("A").unwrap();
        a.set(1.0);

        rig.runtime.set_focus(false);
        assert_eq!(profile.state("a"), Some(0.0));
        rig.runtime.set_focus(true);
        assert_eq!(profile.state("a"), Some(0.0));
        a.set(0.0);
        assert_eq!(profile.state("a"), Some(0.0));
        a.set(1.0);
        assert_eq!(profile.state("a"), Some(1.0));
    }

    #[test]
    fn require_focus_drops_the_release_wait() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("plain", ReferenceKind::Input, "A").unwrap();
        profile.bind("strict", ReferenceKind::Input, "requireFocus(A)").unwrap();
        profile.bind("lenient", ReferenceKind::Input, "ignoreOnFocusChange(A)").unwrap();
        rig.pad.input("A").unwrap().set(1.0);

        rig.runtime.set_focus(false);
        let values = profile.poll();
        assert_eq!(values["plain"], 0.0);
        assert_eq!(values["strict"], 0.0);
        assert_eq!(values["lenient"], 1.0);

        rig.runtime.set_focus(true);
        let values = profile.poll();
        assert_eq!(values["plain"], 0.0);
        assert_eq!(values["strict"], 1.0);
        assert_eq!(values["lenient"], 1.0);
    }

    #[test]
    fn hot_plug_rebinds_through_the_profile() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("b", ReferenceKind::Input, "`Virtual/0/Keys:B`").unwrap();
        assert_eq!(profile.reference("b").unwrap().bound_count(), 0);

        let keys = Arc::new(VirtualDevice::new("Virtual", "Keys").with_inputs(["B"]));
        rig.devices.add_device(keys.clone());
        profile.update_references();
        assert_eq!(profile.reference("b").unwrap().bound_count(), 1);

        keys.input("B").unwrap().set(0.6);
        assert_eq!(profile.state("b"), Some(0.6));
    }

    #[test]
    fn unbinding_lets_variables_be_swept() {
        let rig = rig();
        let mut profile = rig.profile.lock();
        profile.bind("assign", ReferenceKind::Input, "$x = A").unwrap();
        profile.bind("read", ReferenceKind::Input, "$x").unwrap();
        rig.pad.input("A").unwrap().set(1.0);

        let values = profile.poll();
        assert_eq!(values["assign"], 1.0);
        assert_eq!(values["read"], 1.0);

        assert_eq!(profile.sweep(), 0);
        assert!(profile.unbind("assign"));
        assert!(profile.unbind("read"));
        assert_eq!(profile.sweep(), 1);
    }
}
