// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Unified search tool with three auto-detected modes.
//!
//! - **exact filename** — the pattern has no glob metacharacters and ends in
//!   a known file extension (`main.rs`, `setup.py`)
//! - **glob** — the pattern contains `*`, `?`, or `[]` (`src/**/*.rs`)
//! - **text** — anything else is treated as a regex over file contents
//!
//! Text mode prefers a ripgrep binary on PATH and falls back to an
//! in-process walk with line matching.  The walk skips hidden directories,
//! `target`, and `node_modules`, and ignores binary files.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::tool::{Tool, ToolCall, ToolResult};

const DEFAULT_MAX_RESULTS: usize = 50;

/// File extensions that mark a pattern as an exact filename lookup.
const KNOWN_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "c", "h", "cpp", "hpp", "java", "rb", "sh",
    "toml", "yaml", "yml", "json", "md", "txt", "html", "css", "sql", "proto", "lock",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchMode {
    ExactFilename,
    Glob,
    Text,
}

pub(crate) fn detect_mode(pattern: &str) -> SearchMode {
    if pattern.contains(['*', '?', '[', ']']) {
        return SearchMode::Glob;
    }
    let has_known_ext = pattern
        .rsplit_once('.')
        .map(|(_, ext)| KNOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if has_known_ext && !pattern.contains(' ') {
        SearchMode::ExactFilename
    } else {
        SearchMode::Text
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SearchMatch {
    pub file: String,
    pub line_number: Option<u64>,
    pub match_text: String,
}

impl SearchMatch {
    pub(crate) fn to_value(&self) -> Value {
        let mut v = json!({ "file": self.file, "match_text": self.match_text });
        if let Some(n) = self.line_number {
            v["line_number"] = json!(n);
        }
        v
    }
}

pub(crate) struct SearchParams<'a> {
    pub pattern: &'a str,
    pub directory: &'a str,
    pub file_type: Option<&'a str>,
    pub case_sensitive: bool,
    pub max_results: usize,
}

/// Convert a glob pattern to an anchored regex.  Supports `*`, `?`, `[...]`,
/// and `**` (which crosses path separators).
pub(crate) fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow a following slash so "**/x" also matches "x".
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '[' => {
                re.push('[');
                for inner in chars.by_ref() {
                    re.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    regex::Regex::new(&re).ok()
}

fn skippable(entry: &walkdir::DirEntry) -> bool {
    // Never skip the walk root, whatever it is called.
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir()
        && (name.starts_with('.') || name == "target" || name == "node_modules")
}

fn walk(directory: &str) -> impl Iterator<Item = walkdir::DirEntry> + '_ {
    WalkDir::new(directory)
        .into_iter()
        .filter_entry(|e| !skippable(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
}

fn matches_file_type(path: &std::path::Path, file_type: Option<&str>) -> bool {
    match file_type {
        None => true,
        Some(ft) => path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ft.trim_start_matches('.')))
            .unwrap_or(false),
    }
}

pub(crate) fn search_filenames(
    params: &SearchParams<'_>,
    mode: SearchMode,
) -> Result<Vec<SearchMatch>, String> {
    let glob_re = match mode {
        SearchMode::Glob => Some(glob_to_regex(params.pattern).ok_or("invalid glob pattern")?),
        _ => None,
    };

    let mut matches = Vec::new();
    for entry in walk(params.directory) {
        let path = entry.path();
        if !matches_file_type(path, params.file_type) {
            continue;
        }
        let rel = path
            .strip_prefix(params.directory)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let hit = match (&glob_re, mode) {
            (Some(re), _) => re.is_match(&rel) || re.is_match(&entry.file_name().to_string_lossy()),
            (None, _) => {
                let name = entry.file_name().to_string_lossy();
                if params.case_sensitive {
                    name == params.pattern
                } else {
                    name.eq_ignore_ascii_case(params.pattern)
                }
            }
        };
        if hit {
            matches.push(SearchMatch {
                file: path.to_string_lossy().into_owned(),
                line_number: None,
                match_text: rel,
            });
            if matches.len() >= params.max_results {
                break;
            }
        }
    }
    Ok(matches)
}

/// In-process text search: walk + per-line regex match.
fn search_text_walk(params: &SearchParams<'_>) -> Result<Vec<SearchMatch>, String> {
    let re = RegexBuilder::new(params.pattern)
        .case_insensitive(!params.case_sensitive)
        .build()
        .map_err(|e| format!("invalid regex: {e}"))?;

    let mut matches = Vec::new();
    'files: for entry in walk(params.directory) {
        let path = entry.path();
        if !matches_file_type(path, params.file_type) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue; // binary or unreadable
        };
        for (i, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(SearchMatch {
                    file: path.to_string_lossy().into_owned(),
                    line_number: Some(i as u64 + 1),
                    match_text: line.trim_end().to_string(),
                });
                if matches.len() >= params.max_results {
                    break 'files;
                }
            }
        }
    }
    Ok(matches)
}

/// Text search via a ripgrep binary.  Returns `None` when rg is unavailable
/// or exits abnormally, so the caller can fall back to the in-process walk.
async fn search_text_rg(params: &SearchParams<'_>) -> Option<Vec<SearchMatch>> {
    let mut cmd = Command::new("rg");
    cmd.arg("--line-number")
        .arg("--no-heading")
        .arg("--color")
        .arg("never")
        .arg("--max-count")
        .arg(params.max_results.to_string());
    if !params.case_sensitive {
        cmd.arg("-i");
    }
    if let Some(ft) = params.file_type {
        cmd.arg("--glob").arg(format!("*.{}", ft.trim_start_matches('.')));
    }
    cmd.arg("--").arg(params.pattern).arg(params.directory);
    cmd.stdin(std::process::Stdio::null());

    let output = cmd.output().await.ok()?;
    // rg exits 1 on "no matches" — a valid, empty result.
    match output.status.code() {
        Some(0) | Some(1) => {}
        _ => return None,
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(3, ':');
        let (Some(file), Some(lineno), Some(text)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        matches.push(SearchMatch {
            file: file.to_string(),
            line_number: lineno.parse().ok(),
            match_text: text.trim_end().to_string(),
        });
        if matches.len() >= params.max_results {
            break;
        }
    }
    Some(matches)
}

/// Content search: ripgrep when available, in-process walk otherwise.
pub(crate) async fn search_text(params: &SearchParams<'_>) -> Result<Vec<SearchMatch>, String> {
    if let Some(matches) = search_text_rg(params).await {
        debug!(pattern = %params.pattern, hits = matches.len(), "ripgrep search");
        return Ok(matches);
    }
    search_text_walk(params)
}

pub(crate) async fn run_search(params: SearchParams<'_>) -> Result<Vec<SearchMatch>, String> {
    if !std::path::Path::new(params.directory).is_dir() {
        return Err(format!("directory not found: {}", params.directory));
    }
    match detect_mode(params.pattern) {
        SearchMode::ExactFilename => search_filenames(&params, SearchMode::ExactFilename),
        SearchMode::Glob => search_filenames(&params, SearchMode::Glob),
        SearchMode::Text => search_text(&params).await,
    }
}

/// The `file_search` tool: auto-detects filename / glob / text mode.
pub struct FileSearchTool;

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Search the project. The mode is auto-detected from 'pattern':\n\
         - an exact filename (e.g. main.rs) finds files with that name\n\
         - a glob (contains * ? or []) matches paths, e.g. src/**/*.rs\n\
         - anything else is a regex searched in file contents\n\
         Returns matches as {file, line_number?, match_text}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Filename, glob, or content regex"
                },
                "directory": {
                    "type": "string",
                    "description": "Directory to search (default \".\")"
                },
                "file_type": {
                    "type": "string",
                    "description": "Restrict to one extension, e.g. \"rs\""
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Match case exactly (default false)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Result cap (default 50)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(pattern) = call.str_arg("pattern") else {
            return ToolResult::err("missing required 'pattern' argument");
        };
        let directory = call.str_arg("directory").unwrap_or(".");
        let params = SearchParams {
            pattern,
            directory,
            file_type: call.str_arg("file_type"),
            case_sensitive: call.bool_arg("case_sensitive").unwrap_or(false),
            max_results: call.u64_arg("max_results").unwrap_or(DEFAULT_MAX_RESULTS as u64)
                as usize,
        };
        match run_search(params).await {
            Ok(matches) => ToolResult::ok(json!({
                "matches": matches.iter().map(SearchMatch::to_value).collect::<Vec<_>>(),
                "count": matches.len(),
            })),
            Err(e) => ToolResult::err(e),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
