//! Rewrite passes from solver-service notation to typesetting syntax.
//!
//! Each pass is a function `&str -> String` applied in sequence. All
//! passes are idempotent: text already in target syntax is unchanged.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full rewrite pipeline on one line of math text.
pub(crate) fn rewrite_tokens(text: &str) -> String {
    let mut result = substitute_unicode(text);
    result = rewrite_bracket_indices(&result);
    result = rewrite_isolated_star(&result);
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Unicode operator substitution
// ---------------------------------------------------------------------------

/// Replace Unicode math operators with their typesetting commands.
fn substitute_unicode(text: &str) -> String {
    text.replace('≤', r"\le")
        .replace('≥', r"\ge")
        .replace('∑', r"\sum")
        .replace('∀', r"\forall")
        .replace('∈', r"\in")
        .replace('ℝ', r"\mathbb{R}")
        .replace('ℤ', r"\mathbb{Z}")
        .replace('×', r"\cdot")
}

// ---------------------------------------------------------------------------
// Pass 2: Bracket indices → subscripts
// ---------------------------------------------------------------------------

/// Rewrite `name[i][j]` → `name_{i,j}` and `name[i]` → `name_{i}`.
///
/// The double-index form must run first, otherwise the single-index
/// pattern would eat `name[i]` and strand the trailing `[j]`.
fn rewrite_bracket_indices(text: &str) -> String {
    static DOUBLE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\[([A-Za-z0-9_]+)\]\[([A-Za-z0-9_]+)\]")
            .expect("valid regex")
    });
    static SINGLE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\[([A-Za-z0-9_]+)\]").expect("valid regex")
    });

    let result = DOUBLE_INDEX_RE.replace_all(text, "${1}_{${2},${3}}");
    SINGLE_INDEX_RE.replace_all(&result, "${1}_{${2}}").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Isolated `*` → \cdot
// ---------------------------------------------------------------------------

/// Rewrite a `*` surrounded by whitespace into `\cdot`.
///
/// Only the isolated form is touched: `2*x` and `**` are left alone,
/// since those may be code fragments rather than multiplication signs.
fn rewrite_isolated_star(text: &str) -> String {
    static STAR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(^|\s)\*(\s|$)").expect("valid regex"));

    STAR_RE.replace_all(text, "${1}\\cdot${2}").to_string()
}

// ---------------------------------------------------------------------------
// Display-math wrapping
// ---------------------------------------------------------------------------

/// True if the text already carries any math delimiter.
pub(crate) fn has_math_delimiters(text: &str) -> bool {
    text.contains('$') || text.contains(r"\[") || text.contains(r"\(")
}

/// Wrap bare math text in display delimiters; delimited text is untouched.
pub(crate) fn ensure_display_math(text: &str) -> String {
    if has_math_delimiters(text) {
        text.to_string()
    } else {
        format!("$$ {} $$", text.trim())
    }
}
