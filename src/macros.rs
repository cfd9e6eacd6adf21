/// Compile a regular expression once and hand out a `&'static Regex`.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("static regex must compile"));
        &*RE
    }};
}

/// Build the name -> constructor table of the function library.
///
/// ```ignore
/// function_table! {
///     "min" => Min::default(),
///     "hold" => OnHold::default(),
/// }
/// ```
///
/// Every right-hand side is a constructor expression evaluated freshly each
/// time the parser instantiates that function, so per-instance state is never
/// shared between two call sites.
macro_rules! function_table {
    ( $( $name:literal => $ctor:expr ),* $(,)? ) => {{
        let mut table: std::collections::HashMap<&'static str, $crate::functions::Constructor> =
            std::collections::HashMap::new();
        $(
            table.insert(
                $name,
                (|| -> Box<dyn $crate::functions::Function> { Box::new($ctor) }) as $crate::functions::Constructor,
            );
        )*
        table
    }};
}

/// Shorthand for an arity check: `arity!(args, 2..=3, "input, seconds, [taps]")`.
macro_rules! arity {
    ($args:expr, $range:expr, $expected:literal) => {
        if ($range).contains(&$args.len()) { Ok(()) } else { Err($expected) }
    };
}
