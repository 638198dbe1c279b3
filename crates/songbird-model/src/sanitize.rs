// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON-safety projection for tool payloads.
//!
//! Everything sent to a provider as message content must round-trip through
//! JSON without loss.  Tool output can contain styled terminal text (ANSI
//! escape sequences from subprocesses) and stray control characters from
//! lossy decoding; this pass walks a value and replaces every string with its
//! plain-text projection before serialization.  Running unsanitized payloads
//! to the wire is a bug, not a degraded mode.

use serde_json::Value;

/// Recursively project `value` onto JSON-native plain text.
pub fn json_safe(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(plain_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(json_safe).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (plain_text(&k), json_safe(v))).collect(),
        ),
        other => other,
    }
}

/// Strip ANSI escape sequences and non-printable control characters,
/// preserving newlines and tabs.
pub fn plain_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI sequence: ESC [ params final-byte.  Other escapes: ESC + one char.
            if chars.peek() == Some(&'[') {
                chars.next();
                for seq in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&seq) {
                        break;
                    }
                }
            } else {
                chars.next();
            }
            continue;
        }
        if c.is_control() && c != '\n' && c != '\t' && c != '\r' {
            continue;
        }
        out.push(c);
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
