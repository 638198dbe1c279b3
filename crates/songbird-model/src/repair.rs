// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool-argument normalization and repair.
//!
//! Providers deliver tool arguments either as a parsed JSON object or as a
//! JSON-encoded string, and some models emit common malformations: markdown
//! fences, single quotes, unquoted keys, trailing commas, invalid escapes.
//! The contract here is strict-parse first, repair only on failure, and log
//! every repair so misbehaving models are visible in the trace.

use anyhow::bail;
use serde_json::Value;
use tracing::warn;

/// Parse a raw argument payload into a JSON object.
///
/// Accepts both object form and JSON-string form.  An empty payload is a
/// valid empty object (models omit arguments for parameterless tools).
pub fn parse_tool_arguments(raw: &str) -> anyhow::Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    // Strict parse first.
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return normalize_parsed(v);
    }

    // Repair pass.
    let repaired = attempt_json_repair(trimmed)?;
    warn!(original = %truncate_for_log(trimmed), "repaired malformed tool arguments");
    normalize_parsed(repaired)
}

/// A double-encoded payload (`"{\"path\": …}"`) parses to a JSON string;
/// unwrap one level.  Anything that is not an object after unwrapping is
/// rejected — tool arguments are a mapping by contract.
fn normalize_parsed(v: Value) -> anyhow::Result<Value> {
    match v {
        Value::Object(_) => Ok(v),
        Value::String(inner) => {
            let v: Value = serde_json::from_str(&inner)?;
            match v {
                Value::Object(_) => Ok(v),
                other => bail!("tool arguments must be an object, got {other}"),
            }
        }
        Value::Null => Ok(Value::Object(Default::default())),
        other => bail!("tool arguments must be an object, got {other}"),
    }
}

/// Attempt to repair common JSON syntax errors, cheapest first.
fn attempt_json_repair(raw: &str) -> anyhow::Result<Value> {
    // 1. Markdown fence: ```json\n{...}\n```
    let unfenced = strip_markdown_fence(raw);
    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Ok(v);
    }

    // 2. Invalid escape sequences inside string values (`\c`, `\(`, …).
    let fixed = fix_invalid_json_escapes(unfenced);
    if let Ok(v) = serde_json::from_str::<Value>(&fixed) {
        return Ok(v);
    }

    // 3. Python-style dialect: single-quoted strings and unquoted keys.
    let requoted = requote(&fixed);
    if let Ok(v) = serde_json::from_str::<Value>(&requoted) {
        return Ok(v);
    }

    // 4. Trailing commas before a closing bracket.
    let decommaed = regex::Regex::new(r",\s*([}\]])")
        .expect("static pattern")
        .replace_all(&requoted, "$1")
        .into_owned();
    if let Ok(v) = serde_json::from_str::<Value>(&decommaed) {
        return Ok(v);
    }

    // 5. Truncated payload: balance the trailing quote/brace.
    if !decommaed.trim_end().ends_with('}') {
        let mut completed = decommaed.clone();
        if completed.chars().filter(|&c| c == '"').count() % 2 == 1 {
            completed.push('"');
        }
        completed.push('}');
        if let Ok(v) = serde_json::from_str::<Value>(&completed) {
            return Ok(v);
        }
    }

    bail!("all repair strategies exhausted")
}

/// Strip a leading ```` ```json ```` / ```` ``` ```` fence pair if present.
fn strip_markdown_fence(raw: &str) -> &str {
    let t = raw.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let body = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
        return body.trim_end().trim_end_matches("```").trim();
    }
    t
}

/// Convert single-quoted strings to double-quoted and quote bare object keys.
///
/// Only runs as a repair step after strict parsing failed, so mangling an
/// exotic-but-valid document is not a concern.
fn requote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut chars = raw.chars().peekable();
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if !in_double => {
                in_double = true;
                out.push(c);
            }
            '"' if in_double => {
                in_double = false;
                out.push(c);
            }
            '\\' if in_double => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if !in_double => {
                // Re-emit a single-quoted string as double-quoted, escaping
                // any embedded double quotes.
                out.push('"');
                for inner in chars.by_ref() {
                    match inner {
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            _ => out.push(c),
        }
    }

    // Quote bare keys: `{key:` / `, key:` → `"key":`
    regex::Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#)
        .expect("static pattern")
        .replace_all(&out, "$1\"$2\":")
        .into_owned()
}

/// Replace invalid escape sequences inside string values with an escaped
/// backslash.  Valid JSON escapes are `" \ / b f n r t u`.
fn fix_invalid_json_escapes(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len() + 16);
    let mut chars = raw.chars();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => match chars.next() {
                    Some(next)
                        if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') =>
                    {
                        result.push('\\');
                        result.push(next);
                    }
                    Some(next) => {
                        result.push('\\');
                        result.push('\\');
                        result.push(next);
                    }
                    None => result.push('\\'),
                },
                '"' => {
                    in_string = false;
                    result.push('"');
                }
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }
    result
}

fn truncate_for_log(s: &str) -> String {
    const MAX: usize = 200;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
