use inputexpr::{ControlState, ParseResult, ParseStatus, Token, TokenKind, is_function_name};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// Values produced by stepping a bound tree.
pub struct Evaluation {
    pub rate: f64,
    pub bound_controls: usize,
    pub values: Vec<ControlState>,
}

pub fn print_run(
    input: &str,
    tokens: &[Token],
    result: &ParseResult,
    rendering: Option<&str>,
    evaluation: Option<&Evaluation>,
    color: bool,
) {
    let palette = ansi::Palette::new(color);
    let line = single_line(input);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Expression: \"{}\"", line), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Tokens ━━━", ansi::GRAY));
    println!("  {}", highlight(&line, tokens, &palette));
    print_token_list(&line, tokens, &palette);

    println!("\n{}", palette.paint("━━━ Parse ━━━", ansi::GRAY));
    print_status(&line, result, rendering.is_some(), &palette);

    if let Some(rendering) = rendering {
        println!("\n{}", palette.paint("━━━ Canonical ━━━", ansi::GRAY));
        println!("  {}", palette.bold(rendering));
    }

    if let Some(evaluation) = evaluation {
        println!("\n{}", palette.paint("━━━ Evaluation ━━━", ansi::GRAY));
        print_evaluation(evaluation, &palette);
    }
    println!();
}

/// Newlines and tabs become spaces so byte offsets still line up with columns.
fn single_line(input: &str) -> String {
    input.replace(['\n', '\r', '\t'], " ")
}

fn token_color(token: &Token) -> &'static str {
    match token.kind {
        TokenKind::Invalid => ansi::RED,
        TokenKind::Comment | TokenKind::Whitespace | TokenKind::Eof => ansi::GRAY,
        TokenKind::Literal => ansi::GREEN,
        TokenKind::Variable => ansi::YELLOW,
        TokenKind::Control => ansi::CYAN,
        TokenKind::Bareword if is_function_name(&token.data) => ansi::BLUE,
        TokenKind::Bareword => ansi::CYAN,
        TokenKind::Hotkey => ansi::MAGENTA,
        _ => ansi::BOLD,
    }
}

fn token_text<'a>(line: &'a str, token: &Token) -> &'a str {
    line.get(token.position..token.position + token.length).unwrap_or("")
}

fn highlight(line: &str, tokens: &[Token], palette: &ansi::Palette) -> String {
    let mut out = String::new();
    let mut cursor = 0;
    for token in tokens {
        // Anything the lexer skipped over is printed as-is.
        if let Some(gap) = line.get(cursor..token.position) {
            out.push_str(gap);
        }
        out.push_str(&palette.paint(token_text(line, token), token_color(token)));
        cursor = cursor.max(token.position + token.length);
    }
    if let Some(rest) = line.get(cursor..) {
        out.push_str(rest);
    }
    out
}

fn print_token_list(line: &str, tokens: &[Token], palette: &ansi::Palette) {
    for token in tokens.iter().filter(|t| t.kind != TokenKind::Whitespace) {
        println!(
            "    {} {} {}",
            palette.paint(format!("{}..{}", token.position, token.position + token.length), ansi::YELLOW),
            palette.paint(format!("{:?}", token.kind), token_color(token)),
            palette.dim(token_text(line, token)),
        );
    }
}

fn print_status(line: &str, result: &ParseResult, has_fallback: bool, palette: &ansi::Palette) {
    match result.status {
        ParseStatus::Successful => println!("  {}", palette.paint("✓ Successful", ansi::GREEN)),
        ParseStatus::EmptyExpression => println!("  {}", palette.dim("∅ Empty expression (evaluates to 0)")),
        ParseStatus::SyntaxError => {
            println!("  {}", palette.paint("✗ Syntax error", ansi::RED));
            let Some(error) = &result.error else {
                return;
            };
            let span = error.span();
            let column = line.get(..span.start).map_or(0, |prefix| prefix.chars().count());
            let width = line.get(span.clone()).map_or(1, |text| text.chars().count().max(1));
            println!("    {}", line);
            println!("    {}{}", " ".repeat(column), palette.paint("^".repeat(width), ansi::RED));
            println!("    {}", palette.paint(&error.description, ansi::YELLOW));
            if has_fallback {
                println!("  {}", palette.dim("Falling back to the whole text as one control name."));
            }
        }
    }
}

fn print_evaluation(evaluation: &Evaluation, palette: &ansi::Palette) {
    println!(
        "  {} {}  {} {}",
        palette.dim("rate:"),
        palette.paint(format!("{} Hz", evaluation.rate), ansi::BLUE),
        palette.dim("│ bound controls:"),
        palette.paint(evaluation.bound_controls.to_string(), ansi::BLUE),
    );
    for (frame, value) in evaluation.values.iter().enumerate() {
        let seconds = frame as f64 / evaluation.rate;
        println!(
            "  {} {} {}",
            palette.paint(format!("[{}]", frame), ansi::GRAY),
            palette.dim(format!("t={:.4}s", seconds)),
            palette.bold(palette.paint(format!("{}", value), ansi::GREEN)),
        );
    }
}
