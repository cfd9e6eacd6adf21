use crate::api::{ParseStatus, parse_expression};
use crate::device::{DeviceContainer, VirtualDevice};
use crate::expression::{ControlEnvironment, ControlQualifier, Expression, HotkeySuppressions};
use crate::runtime::{InputRuntime, ManualClock, RuntimeOptions};
use crate::ControlState;
use proptest::prelude::*;
use std::sync::Arc;

struct Rig {
    env: ControlEnvironment,
    pad: Arc<VirtualDevice>,
    clock: Arc<ManualClock>,
}

impl Rig {
    fn new() -> Self {
        let (runtime, clock) = InputRuntime::manual(RuntimeOptions::default());
        let devices = Arc::new(DeviceContainer::new());
        let pad = Arc::new(
            VirtualDevice::new("Virtual", "Pad")
                .with_inputs(["A", "B", "C", "Ctrl", "Shift", "Button A"])
                .with_outputs(["Motor"]),
        );
        let qualifier = devices.add_device(pad.clone());
        let env = ControlEnvironment::new(devices, qualifier, runtime, Arc::new(HotkeySuppressions::new()));
        Self { env, pad, clock }
    }

    /// Parse and bind; the parse status is returned alongside the tree.
    fn bind_any(&mut self, text: &str) -> (ParseStatus, Expression) {
        let result = parse_expression(text);
        let mut expr = result.expr.unwrap_or(Expression::literal(0.0));
        expr.update_references(&mut self.env);
        (result.status, expr)
    }

    fn bind(&mut self, text: &str) -> Expression {
        let (status, expr) = self.bind_any(text);
        assert_eq!(status, ParseStatus::Successful, "{:?}", text);
        expr
    }

    fn set(&self, name: &str, value: ControlState) {
        self.pad.input(name).unwrap().set(value);
    }
}

fn eval(text: &str) -> ControlState {
    let mut result = parse_expression(text);
    assert_eq!(result.status, ParseStatus::Successful, "{:?}: {:?}", text, result.error);
    result.value()
}

#[test]
fn empty_input_is_not_an_error() {
    for text in ["", "   "] {
        let mut result = parse_expression(text);
        assert_eq!(result.status, ParseStatus::EmptyExpression);
        assert_eq!(result.value(), 0.0);
    }
}

#[test]
fn and_is_min() {
    let mut rig = Rig::new();
    let mut expr = rig.bind("A & B");

    rig.set("A", 1.0);
    rig.set("B", 0.0);
    assert_eq!(expr.get_value(), 0.0);

    rig.set("A", 0.7);
    rig.set("B", 0.8);
    assert_eq!(expr.get_value(), 0.7);
}

#[test]
fn arithmetic_examples() {
    // Array of (expected_value, expression)
    let cases: Vec<(f64, &str)> = vec![
        (0.0, "1/0"),
        (0.0, "5 % 0"),
        (0.0, "0 / 0"),
        (2.0, "5 % 3"),
        (7.0, "1 + 2 * 3"),
        (9.0, "(1 + 2) * 3"),
        (1.0, "2 > 1"),
        (0.0, "2 < 1"),
        (1.0, "1 ^ 0"),
        (0.5, "0.25 ^ 0.5"),
        (3.0, "1, 2, 3"),
        (1.0, "0 | 0.5 | 1"),
        (2.0, "'2'"),
        (1.0, "Missing + 1"),
    ];
    for (expected, text) in cases {
        let got = eval(text);
        assert!((got - expected).abs() < 1e-12, "{} = {}, expected {}", text, got, expected);
    }
}

#[test]
fn control_reads_clamp_only_at_the_leaf() {
    let mut rig = Rig::new();
    let mut plain = rig.bind("A");
    let mut scaled = rig.bind("A * 4");

    rig.set("A", -0.5);
    assert_eq!(plain.get_value(), 0.0);
    rig.set("A", 0.5);
    assert_eq!(scaled.get_value(), 2.0);
    rig.set("A", 3.0);
    assert_eq!(plain.get_value(), 3.0);
}

#[test]
fn bareword_fallback_names_controls_with_spaces() {
    let mut rig = Rig::new();
    let (status, mut expr) = rig.bind_any("Button A");
    assert_eq!(status, ParseStatus::SyntaxError);
    assert_eq!(expr.count_num_controls(), 1);
    rig.set("Button A", 1.0);
    assert_eq!(expr.get_value(), 1.0);

    let mut quoted = rig.bind("`Button A` * 0.5");
    assert_eq!(quoted.get_value(), 0.5);
}

#[test]
fn assignments_and_outputs_write_through() {
    let mut rig = Rig::new();
    let mut writer = rig.bind("$x = A");
    let mut reader = rig.bind("$x * 2");

    rig.set("A", 0.25);
    assert_eq!(writer.get_value(), 0.25);
    assert_eq!(reader.get_value(), 0.5);

    assert_eq!(rig.bind("$t = 1, $t + 1").get_value(), 2.0);

    let mut motor = rig.bind("Motor");
    motor.set_value(0.3);
    assert_eq!(rig.pad.output("Motor").unwrap().get(), 0.3);

    let mut both = rig.bind("Motor | $y");
    both.set_value(0.6);
    assert_eq!(rig.pad.output("Motor").unwrap().get(), 0.6);
    assert_eq!(rig.env.variable_value("y"), Some(0.6));
}

#[test]
fn hotkey_suppresses_the_plain_binding_while_armed() {
    let mut rig = Rig::new();
    let mut hotkey = rig.bind("@(Ctrl+A)");
    let mut plain = rig.bind("A");

    rig.set("Ctrl", 1.0);
    rig.set("A", 1.0);
    assert_eq!(hotkey.get_value(), 1.0);
    assert_eq!(plain.get_value(), 0.0);

    rig.set("Ctrl", 0.0);
    assert_eq!(hotkey.get_value(), 0.0);
    assert_eq!(plain.get_value(), 1.0);
}

#[test]
fn hotkey_needs_release_before_rearming() {
    let mut rig = Rig::new();
    let mut hotkey = rig.bind("@(Ctrl+A)");

    // A already held when Ctrl goes down: blocked.
    rig.set("A", 1.0);
    assert_eq!(hotkey.get_value(), 0.0);
    rig.set("Ctrl", 1.0);
    assert_eq!(hotkey.get_value(), 0.0);

    rig.set("A", 0.0);
    assert_eq!(hotkey.get_value(), 0.0);
    rig.set("A", 1.0);
    assert_eq!(hotkey.get_value(), 1.0);
}

#[test]
fn more_specific_hotkey_wins() {
    let mut rig = Rig::new();
    let mut specific = rig.bind("@(Ctrl+Shift+A)");
    let mut general = rig.bind("@(Ctrl+A)");

    rig.set("Ctrl", 1.0);
    rig.set("Shift", 1.0);
    rig.set("A", 1.0);
    assert_eq!(specific.get_value(), 1.0);
    assert_eq!(general.get_value(), 0.0);
}

#[test]
fn dropping_a_hotkey_releases_its_suppression() {
    let mut rig = Rig::new();
    let mut hotkey = rig.bind("@(Ctrl+A)");
    let mut plain = rig.bind("A");

    rig.set("Ctrl", 1.0);
    rig.set("A", 1.0);
    hotkey.get_value();
    assert_eq!(plain.get_value(), 0.0);

    drop(hotkey);
    assert_eq!(plain.get_value(), 1.0);
}

#[test]
fn rebinding_an_armed_hotkey_keeps_one_registration() {
    let mut rig = Rig::new();
    let mut hotkey = rig.bind("@(Ctrl+A)");
    let mut plain = rig.bind("A");
    let id = |name: &str| rig.env.find_input(&ControlQualifier::bare(name)).map(|(id, _)| id).unwrap();
    let (a, ctrl) = (id("A"), id("Ctrl"));
    let table = rig.env.suppressions().clone();

    rig.set("Ctrl", 1.0);
    rig.set("A", 1.0);
    assert_eq!(hotkey.get_value(), 1.0);
    assert_eq!(table.active_count(a, ctrl), 1);

    hotkey.update_references(&mut rig.env);
    hotkey.update_references(&mut rig.env);
    assert_eq!(table.active_count(a, ctrl), 1);
    assert_eq!(plain.get_value(), 0.0);
    assert_eq!(hotkey.get_value(), 1.0);
    assert_eq!(table.active_count(a, ctrl), 1);

    drop(hotkey);
    assert_eq!(table.active_count(a, ctrl), 0);
    assert_eq!(plain.get_value(), 1.0);
}

#[test]
fn unplugging_the_device_releases_hotkey_registrations() {
    let mut rig = Rig::new();
    let mut hotkey = rig.bind("@(Ctrl+A)");
    let id = |name: &str| rig.env.find_input(&ControlQualifier::bare(name)).map(|(id, _)| id).unwrap();
    let (a, ctrl) = (id("A"), id("Ctrl"));
    let table = rig.env.suppressions().clone();

    rig.set("Ctrl", 1.0);
    rig.set("A", 1.0);
    hotkey.get_value();
    assert_eq!(table.active_count(a, ctrl), 1);

    let pad = rig.env.default_device().clone();
    assert!(rig.env.devices().remove_device(&pad));
    hotkey.update_references(&mut rig.env);
    assert_eq!(table.active_count(a, ctrl), 0);
    assert!(!table.is_suppressed(a));
    assert_eq!(hotkey.get_value(), 0.0);
}

#[test]
fn canonical_rendering() {
    let cases: Vec<(&str, &str)> = vec![
        ("((A & B) | not(C))", "A & B | !C"),
        ("(1 + (2 * 3))", "1+2*3"),
        ("((8 - 2) - 1)", "8 - 2 - 1"),
        ("onHold(A, 1)", "hold(A, 1)"),
        ("`Button A`", "`Button A`"),
        ("`not`", "`not`"),
        ("`Virtual/0/Pad:A`", "`Virtual/0/Pad:A`"),
        ("@(Ctrl+A)", "@( Ctrl + A )"),
        ("($speed = 0.5)", "$speed = 0.5"),
        ("minus(0.5)", "-0.5"),
        ("2", "'2'"),
        ("max(1, (2, 3))", "max(1, (2, 3))"),
        ("gameSpeed()", "gameSpeed /* speed */ ()"),
    ];
    for (expected, text) in cases {
        let result = parse_expression(text);
        let expr = result.expr.expect("parsed");
        assert_eq!(expr.to_string(), expected, "input: {:?}", text);
    }
}

fn arb_expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..100).prop_map(|n| (f64::from(n) / 10.0).to_string()),
        prop::sample::select(vec!["A", "B", "C", "`Virtual/0/Pad:B`", "$x"]).prop_map(String::from),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        let operators = prop::sample::select(vec!["+", "-", "*", "/", "%", "&", "|", "^", "<", ">", ","]);
        prop_oneof![
            (inner.clone(), operators, inner.clone()).prop_map(|(lhs, op, rhs)| format!("{} {} {}", lhs, op, rhs)),
            inner.clone().prop_map(|e| format!("({})", e)),
            inner.clone().prop_map(|e| format!("!{}", e)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("max(({}), ({}))", a, b)),
            inner.prop_map(|e| format!("toggle(({}))", e)),
        ]
    })
}

/// Bind `text` in a fresh rig and evaluate it over a fixed input script.
fn run_script(text: &str) -> Vec<ControlState> {
    let mut rig = Rig::new();
    let mut expr = rig.bind(text);
    let script = [(0.7, 0.2, 0.0), (1.0, 0.0, 0.9), (0.0, 0.4, 1.0)];
    script
        .iter()
        .map(|&(a, b, c)| {
            rig.clock.advance_secs(0.005);
            rig.set("A", a);
            rig.set("B", b);
            rig.set("C", c);
            expr.get_value()
        })
        .collect()
}

proptest! {
    #[test]
    fn evaluation_is_deterministic(text in arb_expression()) {
        prop_assert_eq!(run_script(&text), run_script(&text));
    }

    #[test]
    fn rendering_round_trips(text in arb_expression()) {
        let rendered = parse_expression(&text).expr.expect("generated expressions parse").to_string();
        let reparsed = parse_expression(&rendered);
        prop_assert_eq!(reparsed.status, ParseStatus::Successful, "{} rendered as {}", text, rendered);
        prop_assert_eq!(run_script(&text), run_script(&rendered), "{} rendered as {}", text, rendered);
    }
}
