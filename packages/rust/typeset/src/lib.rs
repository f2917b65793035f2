//! Math-typesetting preparation for formulation and solution text.
//!
//! The solver service returns mixed text: prose, Unicode math notation,
//! and occasional pre-delimited typesetting fragments. This crate decides,
//! line by line, whether text is safe to hand to the typesetting engine,
//! and if so rewrites it into engine syntax. Anything that fails the
//! balance gate renders verbatim as plain text — a wrong "plain" verdict
//! costs a little polish, a wrong "math" verdict corrupts the page.

mod gate;
mod rewrite;

use std::sync::LazyLock;

use regex::Regex;

pub use gate::is_balanced;

/// Characters that mark a line as mathematical.
const MATH_CHARS: [char; 6] = ['≤', '≥', '∈', '∑', '∀', '×'];

/// Keywords that mark a line as mathematical (matched case-insensitively).
const MATH_KEYWORDS: [&str; 3] = ["minimize", "maximize", "subject to"];

/// Matches bracketed index expressions like `x[i]` or `cost[i][j]`.
static INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*\[[A-Za-z0-9_]+\]").expect("valid regex"));

/// Matches an inline comment introduced by whitespace followed by `#`.
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s#").expect("valid regex"));

// ---------------------------------------------------------------------------
// Options and output
// ---------------------------------------------------------------------------

/// Rendering options.
#[derive(Debug, Clone)]
pub struct TypesetOptions {
    /// Also require balanced curly-brace nesting in the safety gate.
    pub strict_braces: bool,
}

impl Default for TypesetOptions {
    fn default() -> Self {
        Self {
            strict_braces: true,
        }
    }
}

/// One line of prepared output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Safe math, rewritten into typesetting syntax. The stripped inline
    /// comment, if any, is carried separately for the display layer to
    /// re-append after the typeset fragment.
    Math {
        tex: String,
        comment: Option<String>,
    },
    /// Plain text, passed through verbatim.
    Plain { text: String },
}

impl Rendered {
    pub fn is_math(&self) -> bool {
        matches!(self, Rendered::Math { .. })
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Decide whether a line should be typeset as math.
pub fn is_math_line(line: &str) -> bool {
    if line.chars().any(|c| MATH_CHARS.contains(&c)) {
        return true;
    }

    let lowered = line.to_lowercase();
    if MATH_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return true;
    }

    if INDEX_RE.is_match(line) {
        return true;
    }

    // Pre-delimited fragments are math by intent; the gate decides
    // whether they are safe.
    rewrite::has_math_delimiters(line)
}

/// Apply the token rewrite passes to math text (idempotent).
pub fn rewrite_math(text: &str) -> String {
    rewrite::rewrite_tokens(text)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Prepare one line of formulation/solution text for display.
pub fn render_line(line: &str, opts: &TypesetOptions) -> Rendered {
    let (body, comment) = split_trailing_comment(line);

    if body.trim().is_empty() || !is_math_line(body) {
        return Rendered::Plain {
            text: line.to_string(),
        };
    }

    if !gate::is_balanced(body, opts.strict_braces) {
        return Rendered::Plain {
            text: line.to_string(),
        };
    }

    let tex = rewrite::ensure_display_math(&rewrite::rewrite_tokens(body));
    Rendered::Math {
        tex,
        comment: comment.map(str::to_string),
    }
}

/// Prepare a whole text block, line by line.
pub fn render_block(text: &str, opts: &TypesetOptions) -> Vec<Rendered> {
    text.lines().map(|line| render_line(line, opts)).collect()
}

/// Split `line` at the first whitespace-introduced `#` comment.
///
/// Returns the body (trailing whitespace trimmed) and the comment text
/// without the `#`. A `#` at the start of the line is not a comment
/// marker.
fn split_trailing_comment(line: &str) -> (&str, Option<&str>) {
    match COMMENT_RE.find(line) {
        Some(m) => {
            let body = line[..m.start()].trim_end();
            let comment = line[m.end()..].trim();
            (body, Some(comment))
        }
        None => (line, None),
    }
}
