//! Alternate-delimiter scanner.
//!
//! Source files in the input tree mark template actions with a delimiter pair
//! distinct from the engine's `{{ }}` (by default `{{<` and `>}}`), so that
//! braces in plain content, or in fragments pulled in verbatim, are left
//! alone. [`translate`] rewrites such a source into native engine syntax.

use crate::error::DelimError;
use serde_json::Value;

/// A parsed segment of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text to emit verbatim.
    Lit(&'a str),
    /// Action body, between the delimiters, untrimmed.
    Action(&'a str),
}

/// Split `input` into [`Segment`]s.
///
/// Returns borrowed slices into `input`; no allocations per segment.
pub fn parse<'a>(input: &'a str, left: &str, right: &str) -> Result<Vec<Segment<'a>>, DelimError> {
    let mut segments = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let Some(open) = rest.find(left) else {
            segments.push(Segment::Lit(rest));
            break;
        };
        if open > 0 {
            segments.push(Segment::Lit(&rest[..open]));
        }
        let after_open = &rest[open + left.len()..];

        let Some(close) = after_open.find(right) else {
            let consumed = input.len() - rest.len() + open;
            return Err(DelimError::Unclosed {
                line: input[..consumed].matches('\n').count() + 1,
                delim: left.to_owned(),
            });
        };
        segments.push(Segment::Action(&after_open[..close]));
        rest = &after_open[close + right.len()..];
    }

    Ok(segments)
}

/// Rewrite a source using `left`/`right` delimiters into engine syntax.
///
/// Whitespace control (`{{<- x ->}}`) is resolved here by trimming the
/// neighbouring literals, so the engine never sees a `~`.
pub fn translate(input: &str, left: &str, right: &str) -> Result<String, DelimError> {
    let segments = parse(input, left, right)?;
    let mut out = String::with_capacity(input.len() + 16 * segments.len());
    let mut trim_next = false;

    for (i, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Lit(t) => {
                let mut t = *t;
                if trim_next {
                    t = t.trim_start_matches(is_space);
                }
                if let Some(Segment::Action(next)) = segments.get(i + 1) {
                    if trim_marks(next).0 {
                        t = t.trim_end_matches(is_space);
                    }
                }
                push_literal(&mut out, t);
                trim_next = false;
            }
            Segment::Action(body) => {
                let (_, body, right_trim) = trim_marks(body);
                out.push_str("{{");
                out.push_str(body);
                out.push_str("}}");
                trim_next = right_trim;
            }
        }
    }

    Ok(out)
}

/// Emit literal text. Text the engine could read as syntax (any brace, or a
/// trailing backslash that would escape the next action) goes through the
/// `lit` helper as a string parameter instead.
fn push_literal(out: &mut String, t: &str) {
    if t.contains('{') || t.ends_with('\\') {
        out.push_str("{{lit ");
        out.push_str(&Value::from(t).to_string());
        out.push_str("}}");
    } else {
        out.push_str(t);
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Split `- ` / ` -` whitespace-control marks off an action body.
fn trim_marks(body: &str) -> (bool, &str, bool) {
    let (left, body) = match body.strip_prefix('-') {
        Some(rest) if rest.starts_with(is_space) => (true, rest),
        _ => (false, body),
    };
    let (right, body) = match body.strip_suffix('-') {
        Some(rest) if rest.ends_with(is_space) => (true, rest),
        _ => (false, body),
    };
    (left, body, right)
}
