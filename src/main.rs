mod debug_report;

use inputexpr::{
    ControlEnvironment, DeviceContainer, HotkeySuppressions, InputRuntime, ParseStatus, RuntimeOptions,
    VirtualDevice, parse_expression, tokenize,
};
use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_RATE: f64 = 200.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("INPUTEXPR_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let (tokens, _) = tokenize(&config.input);
    let mut result = parse_expression(&config.input);
    let rendering = result.expr.as_ref().map(ToString::to_string);
    let evaluation = evaluate(&config, result.expr.take());

    debug_report::print_run(&config.input, &tokens, &result, rendering.as_deref(), evaluation.as_ref(), config.color);

    if result.status == ParseStatus::SyntaxError {
        std::process::exit(1);
    }
}

struct CliConfig {
    input: String,
    /// `(name, value)` pairs; names starting with `$` set variables.
    assignments: Vec<(String, f64)>,
    frames: usize,
    rate: f64,
    color: bool,
}

/// Bind `expr` to a virtual pad carrying every `--set` input and step it
/// frame by frame on a manual clock.
fn evaluate(config: &CliConfig, expr: Option<inputexpr::Expression>) -> Option<debug_report::Evaluation> {
    let mut expr = expr?;
    if config.frames == 0 {
        return None;
    }

    let options = RuntimeOptions { input_update_rate: config.rate, ..RuntimeOptions::default() };
    let (runtime, clock) = InputRuntime::manual(options);

    let inputs: Vec<&str> =
        config.assignments.iter().map(|(name, _)| name.as_str()).filter(|name| !name.starts_with('$')).collect();
    let pad = Arc::new(VirtualDevice::new("CLI", "Virtual").with_inputs(inputs));
    let devices = Arc::new(DeviceContainer::new());
    let qualifier = devices.add_device(pad.clone());
    debug!("Virtual device attached: {}", qualifier);

    let mut env = ControlEnvironment::new(devices, qualifier, runtime, Arc::new(HotkeySuppressions::new()));
    for (name, value) in &config.assignments {
        match name.strip_prefix('$') {
            Some(variable) => env.variable(variable).set(*value),
            None => {
                if let Some(input) = pad.input(name) {
                    input.set(*value);
                }
            }
        }
    }
    expr.update_references(&mut env);

    let step = 1.0 / config.rate;
    let values = (0..config.frames)
        .map(|_| {
            let value = expr.get_value();
            clock.advance_secs(step);
            value
        })
        .collect();

    Some(debug_report::Evaluation { rate: config.rate, bound_controls: expr.count_num_controls(), values })
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut assignments = Vec::new();
    let mut frames = 1;
    let mut rate = DEFAULT_RATE;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("inputexpr {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--set" => {
                let value = args.next().ok_or_else(|| "error: --set expects NAME=VALUE".to_string())?;
                assignments.push(parse_assignment(&value)?);
            }
            "--frames" => {
                let value = args.next().ok_or_else(|| "error: --frames expects a value".to_string())?;
                frames = parse_frames(&value)?;
            }
            "--rate" => {
                let value = args.next().ok_or_else(|| "error: --rate expects a value".to_string())?;
                rate = parse_rate(&value)?;
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--set=") => assignments.push(parse_assignment(arg.trim_start_matches("--set="))?),
            _ if arg.starts_with("--frames=") => frames = parse_frames(arg.trim_start_matches("--frames="))?,
            _ if arg.starts_with("--rate=") => rate = parse_rate(arg.trim_start_matches("--rate="))?,
            _ if arg.starts_with("--") => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                // Anything else starts the expression, which may itself begin with `-`.
                input = Some(std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" "));
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.trim().is_empty() {
        return Err(format!("error: no expression provided\n\n{}", help_text()));
    }

    Ok(CliConfig { input, assignments, frames, rate, color })
}

fn parse_assignment(value: &str) -> Result<(String, f64), String> {
    let (name, state) =
        value.split_once('=').ok_or_else(|| format!("error: invalid --set '{value}' (expected NAME=VALUE)"))?;
    let name = name.trim();
    if name.is_empty() || name == "$" {
        return Err(format!("error: invalid --set '{value}' (empty name)"));
    }
    let state = state
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("error: invalid --set '{value}' (value must be a finite number)"))?;
    Ok((name.to_string(), state))
}

fn parse_frames(value: &str) -> Result<usize, String> {
    value.parse().map_err(|_| format!("error: invalid --frames '{value}' (expected a whole number)"))
}

fn parse_rate(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|hz| hz.is_finite() && *hz > 0.0)
        .ok_or_else(|| format!("error: invalid --rate '{value}' (expected a positive number of Hz)"))
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "inputexpr {version}

Parse and evaluate a controller mapping expression.

Usage:
  inputexpr [OPTIONS] [--] <expression...>
  echo '<expression>' | inputexpr [OPTIONS]

Options:
  --set <NAME=VALUE>         Set a virtual input (or `$name` variable) before
                             evaluating. May be repeated.
  --frames <N>               Number of frames to evaluate. 0 skips evaluation.
                             Default: 1
  --rate <HZ>                Input update rate the frames are stepped at.
                             Default: {rate}
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  INPUTEXPR_LOG              tracing filter directives, e.g. `inputexpr=debug`.

Exit codes:
  0  Success.
  1  Syntax error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        rate = DEFAULT_RATE
    )
}
