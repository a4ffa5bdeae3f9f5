//! Argument Resolver — substitutes prior step results into arguments.
//!
//! Payloads are compiled once, at parse time, into an [`ArgTemplate`]. Each
//! string is scanned for substitution tokens:
//!
//! ```text
//! $stepN_result   output of the Nth recorded step of the session (1-based)
//! $last_result    output of the most recently recorded step
//! $$step1_result  escaped: the literal text "$step1_result"
//! ```
//!
//! A token must be followed by a non-identifier character (or the end of the
//! string). Any other `$` text is left alone, so shell fragments such as
//! `$HOME` or `$$` pass through untouched.
//!
//! The template is resolved immediately before its step runs, so a token can
//! refer to results produced earlier in the same chain.

use crate::error::SubstitutionError;
use crate::session::{SessionState, StepResult};
use serde_json::{Map, Value};

/// A typed reference to a recorded step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRef {
    /// 1-based index into the session's results
    Index(usize),
    /// The most recent result at resolution time
    Last,
}

/// A piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Ref(StepRef),
}

/// A compiled argument payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgTemplate {
    /// A value with no substitution tokens.
    Literal(Value),
    /// A string that is exactly one token: substituted structurally.
    Ref(StepRef),
    /// A string mixing text and tokens: substituted as text.
    Interpolated(Vec<Segment>),
    Object(Vec<(String, ArgTemplate)>),
    Array(Vec<ArgTemplate>),
}

impl ArgTemplate {
    /// Compile a raw JSON value into a template.
    pub fn compile(raw: &Value) -> Self {
        match raw {
            Value::String(s) => compile_str(s),
            Value::Object(map) => ArgTemplate::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), ArgTemplate::compile(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                ArgTemplate::Array(items.iter().map(ArgTemplate::compile).collect())
            }
            other => ArgTemplate::Literal(other.clone()),
        }
    }

    /// Compile an argument mapping.
    pub fn compile_args(raw: &Map<String, Value>) -> Self {
        ArgTemplate::Object(
            raw.iter()
                .map(|(k, v)| (k.clone(), ArgTemplate::compile(v)))
                .collect(),
        )
    }

    /// Whether any token appears anywhere in this template.
    pub fn has_refs(&self) -> bool {
        match self {
            ArgTemplate::Literal(_) => false,
            ArgTemplate::Ref(_) | ArgTemplate::Interpolated(_) => true,
            ArgTemplate::Object(fields) => fields.iter().any(|(_, t)| t.has_refs()),
            ArgTemplate::Array(items) => items.iter().any(ArgTemplate::has_refs),
        }
    }

    /// Substitute tokens against the recorded results.
    pub fn resolve(&self, results: &[StepResult]) -> Result<Value, SubstitutionError> {
        match self {
            ArgTemplate::Literal(v) => Ok(v.clone()),
            ArgTemplate::Ref(r) => lookup(*r, results).cloned(),
            ArgTemplate::Interpolated(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(t) => out.push_str(t),
                        Segment::Ref(r) => out.push_str(&render(lookup(*r, results)?)),
                    }
                }
                Ok(Value::String(out))
            }
            ArgTemplate::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, template) in fields {
                    map.insert(key.clone(), template.resolve(results)?);
                }
                Ok(Value::Object(map))
            }
            ArgTemplate::Array(items) => items
                .iter()
                .map(|t| t.resolve(results))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

/// Compile and resolve `raw_args` against a session in one call.
pub fn resolve(
    raw_args: &Map<String, Value>,
    state: &SessionState,
) -> Result<Map<String, Value>, SubstitutionError> {
    match ArgTemplate::compile_args(raw_args).resolve(state.results())? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn lookup(r: StepRef, results: &[StepResult]) -> Result<&Value, SubstitutionError> {
    let index = match r {
        StepRef::Index(n) => n,
        StepRef::Last => results.len(),
    };
    if index == 0 || index > results.len() {
        return Err(SubstitutionError::UnknownStep {
            index,
            recorded: results.len(),
        });
    }
    let result = &results[index - 1];
    if !result.success {
        return Err(SubstitutionError::FailedStep { index });
    }
    Ok(&result.output)
}

/// Text form of a value when embedded inside a larger string.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compile_str(s: &str) -> ArgTemplate {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        text.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        // `$$token` escapes the token
        if let Some(stripped) = after.strip_prefix('$') {
            if let Some((_, len)) = match_token(stripped) {
                text.push('$');
                text.push_str(&stripped[..len]);
                rest = &stripped[len..];
                continue;
            }
        }

        match match_token(after) {
            Some((r, len)) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Ref(r));
                rest = &after[len..];
            }
            None => {
                text.push('$');
                rest = after;
            }
        }
    }
    text.push_str(rest);

    if segments.is_empty() {
        return ArgTemplate::Literal(Value::String(text));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    match segments.as_slice() {
        [Segment::Ref(r)] => ArgTemplate::Ref(*r),
        _ => ArgTemplate::Interpolated(segments),
    }
}

/// Match a token body (text after `$`). Returns the reference and byte length.
fn match_token(s: &str) -> Option<(StepRef, usize)> {
    let (r, len) = if let Some(rest) = s.strip_prefix("step") {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || !rest[digits..].starts_with("_result") {
            return None;
        }
        let index = rest[..digits].parse::<usize>().ok()?;
        (StepRef::Index(index), "step".len() + digits + "_result".len())
    } else if s.starts_with("last_result") {
        (StepRef::Last, "last_result".len())
    } else {
        return None;
    };

    let boundary = s[len..]
        .chars()
        .next()
        .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'));
    boundary.then_some((r, len))
}
