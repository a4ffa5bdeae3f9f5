//! Command Parser — turns one input line into an ordered list of steps.
//!
//! Grammar (informal):
//! ```text
//! line     = jump | chain | shortcut
//! jump     = "jump" ADDRESS [JSON_OBJECT]
//! chain    = jump ("->" jump)+
//!          | "chain" step ("->" step)*        step = ["jump"] ADDRESS [JSON_OBJECT]
//! shortcut = DIGITS [JSON_OBJECT]             relative to the navigation cursor
//! ```
//!
//! `->` only splits at the top level, never inside a JSON payload. A missing
//! payload means "no arguments". Parsing is all-or-nothing: a malformed step
//! anywhere rejects the whole line.

use crate::address::Address;
use crate::error::ParseError;
use crate::resolver::ArgTemplate;
use serde_json::{Map, Value};
use std::fmt;

/// Where a step points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Absolute(Address),
    /// A child segment of whatever node is current when the step runs.
    Relative(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Absolute(address) => write!(f, "{address}"),
            Target::Relative(n) => write!(f, "RELATIVE({n})"),
        }
    }
}

/// One parsed step: a target plus its argument payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStep {
    pub target: Target,
    pub raw_args: Map<String, Value>,
    /// `raw_args` compiled for substitution
    pub args: ArgTemplate,
}

impl ChainStep {
    pub fn new(target: Target, raw_args: Map<String, Value>) -> Self {
        let args = ArgTemplate::compile_args(&raw_args);
        Self {
            target,
            raw_args,
            args,
        }
    }
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Jump(ChainStep),
    Chain(Vec<ChainStep>),
    Shortcut(ChainStep),
}

impl Command {
    pub fn steps(&self) -> &[ChainStep] {
        match self {
            Command::Jump(step) | Command::Shortcut(step) => std::slice::from_ref(step),
            Command::Chain(steps) => steps,
        }
    }

    /// Single, non-chained navigation moves the cursor.
    pub fn moves_cursor(&self) -> bool {
        !matches!(self, Command::Chain(_))
    }
}

/// Parse a line into a [`Command`].
pub fn parse_line(input: &str) -> Result<Command, ParseError> {
    let line = input.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let (head, rest) = split_word(line);
    match head.to_ascii_lowercase().as_str() {
        "jump" => {
            let mut steps = split_chain(line)?
                .into_iter()
                .enumerate()
                .map(|(i, text)| parse_step(text, i + 1, true))
                .collect::<Result<Vec<_>, _>>()?;
            if steps.len() == 1 {
                Ok(Command::Jump(steps.remove(0)))
            } else {
                Ok(Command::Chain(steps))
            }
        }
        "chain" => {
            if rest.is_empty() {
                return Err(ParseError::MissingAddress { step: 1 });
            }
            let steps = split_chain(rest)?
                .into_iter()
                .enumerate()
                .map(|(i, text)| parse_step(text, i + 1, false))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Chain(steps))
        }
        digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            let option = digits.parse::<u32>().map_err(|_| ParseError::InvalidAddress {
                step: 1,
                address: digits.to_string(),
            })?;
            let raw_args = parse_payload(rest, 1)?;
            Ok(Command::Shortcut(ChainStep::new(Target::Relative(option), raw_args)))
        }
        _ => Err(ParseError::UnknownCommand(head.to_string())),
    }
}

fn parse_step(text: &str, step: usize, require_jump: bool) -> Result<ChainStep, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::EmptyStep { step });
    }

    let (word, rest) = split_word(text);
    let (address, rest) = if word.eq_ignore_ascii_case("jump") {
        split_word(rest)
    } else if require_jump {
        return Err(ParseError::ExpectedJump {
            step,
            found: word.to_string(),
        });
    } else {
        (word, rest)
    };

    if address.is_empty() {
        return Err(ParseError::MissingAddress { step });
    }
    let address = address
        .parse::<Address>()
        .map_err(|_| ParseError::InvalidAddress {
            step,
            address: address.to_string(),
        })?;

    let raw_args = parse_payload(rest, step)?;
    Ok(ChainStep::new(Target::Absolute(address), raw_args))
}

fn parse_payload(text: &str, step: usize) -> Result<Map<String, Value>, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(text).map_err(|e| ParseError::InvalidArguments {
        step,
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::ArgumentsNotObject { step }),
    }
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

/// Split on `->` outside of JSON strings, objects and arrays.
fn split_chain(s: &str) -> Result<Vec<&str>, ParseError> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ParseError::Unbalanced);
                    }
                }
                b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
                    parts.push(&s[start..i]);
                    start = i + 2;
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        i += 1;
    }

    if in_string || depth != 0 {
        return Err(ParseError::Unbalanced);
    }
    parts.push(&s[start..]);
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abs(s: &str) -> Target {
        Target::Absolute(s.parse().unwrap())
    }

    #[test]
    fn jump_without_payload() {
        let cmd = parse_line("jump 0.5.1").unwrap();
        let Command::Jump(step) = &cmd else {
            panic!("expected jump, got {cmd:?}");
        };
        assert_eq!(step.target, abs("0.5.1"));
        assert!(step.raw_args.is_empty());
        assert!(cmd.moves_cursor());
    }

    #[test]
    fn jump_with_payload() {
        let cmd = parse_line(r#"jump 0.1.1 {"title":"t","message":"hi"}"#).unwrap();
        let step = &cmd.steps()[0];
        assert_eq!(step.raw_args.get("title"), Some(&json!("t")));
        assert_eq!(step.raw_args.get("message"), Some(&json!("hi")));
    }

    #[test]
    fn chain_splits_in_order() {
        let line = r#"jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo step1"}} -> jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo $step1_result"}}"#;
        let cmd = parse_line(line).unwrap();
        assert!(!cmd.moves_cursor());
        let steps = cmd.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].raw_args["parameters"]["command"], json!("echo step1"));
        assert!(steps[1].args.has_refs());
        assert!(!steps[0].args.has_refs());
    }

    #[test]
    fn arrow_inside_json_does_not_split() {
        let cmd = parse_line(r#"jump 0.5.1 {"cmd":"a -> b","list":["->"]} -> jump 0.2"#).unwrap();
        let steps = cmd.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].raw_args["cmd"], json!("a -> b"));
        assert_eq!(steps[1].target, abs("0.2"));
    }

    #[test]
    fn escaped_quote_in_string() {
        let cmd = parse_line(r#"jump 0.1 {"q":"say \"->\" now"}"#).unwrap();
        assert_eq!(cmd.steps().len(), 1);
        assert_eq!(cmd.steps()[0].raw_args["q"], json!("say \"->\" now"));
    }

    #[test]
    fn chain_keyword_form() {
        let cmd = parse_line(r#"chain 0.1 {"a":1} -> jump 0.2 -> 0.3"#).unwrap();
        let targets: Vec<_> = cmd.steps().iter().map(|s| s.target.to_string()).collect();
        assert_eq!(targets, vec!["0.1", "0.2", "0.3"]);
        assert!(matches!(cmd, Command::Chain(_)));
    }

    #[test]
    fn shortcut_is_relative() {
        let cmd = parse_line(r#"3 {"x":1}"#).unwrap();
        let Command::Shortcut(step) = &cmd else {
            panic!("expected shortcut, got {cmd:?}");
        };
        assert_eq!(step.target, Target::Relative(3));
        assert_eq!(step.target.to_string(), "RELATIVE(3)");
        assert_eq!(step.raw_args["x"], json!(1));
    }

    #[test]
    fn malformed_lines_are_rejected_whole() {
        assert_eq!(parse_line("   "), Err(ParseError::Empty));
        assert!(matches!(parse_line("fly 0.1"), Err(ParseError::UnknownCommand(_))));
        assert!(matches!(parse_line("jump"), Err(ParseError::MissingAddress { step: 1 })));
        assert!(matches!(
            parse_line("jump 0.x"),
            Err(ParseError::InvalidAddress { step: 1, .. })
        ));
        assert!(matches!(
            parse_line("jump 0.1 -> 0.2"),
            Err(ParseError::ExpectedJump { step: 2, .. })
        ));
        assert!(matches!(
            parse_line("jump 0.1 -> "),
            Err(ParseError::EmptyStep { step: 2 })
        ));
        assert!(matches!(
            parse_line("jump 0.1 {not json}"),
            Err(ParseError::InvalidArguments { step: 1, .. })
        ));
        assert!(matches!(
            parse_line("jump 0.1 [1,2]"),
            Err(ParseError::ArgumentsNotObject { step: 1 })
        ));
        assert_eq!(parse_line(r#"jump 0.1 {"a":"b""#), Err(ParseError::Unbalanced));
        assert!(matches!(
            parse_line(r#"jump 0.1 {"a":1} -> jump 0.2 {"b":"#),
            Err(ParseError::Unbalanced)
        ));
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert!(matches!(parse_line("JUMP 0.1"), Ok(Command::Jump(_))));
    }

    #[test]
    fn parsing_is_deterministic() {
        let line = r#"jump 0.1.1 -> jump 0.1.2 {"x":"$step5_result","n":[1,{"y":"$last_result"}]}"#;
        assert_eq!(parse_line(line).unwrap(), parse_line(line).unwrap());
    }
}
