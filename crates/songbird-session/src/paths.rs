// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

/// Turn an absolute project root into a single path component:
/// separators become `-`, drive colons are stripped.
///
/// `/home/user/proj` → `-home-user-proj`; `C:\work\proj` → `C-work-proj`.
pub fn sanitize_project_root(root: &Path) -> String {
    root.to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            _ => c,
        })
        .filter(|&c| c != ':')
        .collect()
}

/// Storage directory for one project:
/// `<base>/projects/<sanitized-project-root>/`.
pub fn project_dir(base: &Path, project_root: &Path) -> PathBuf {
    base.join("projects").join(sanitize_project_root(project_root))
}

/// Default storage base: `~/.songbird`.
pub fn default_base() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".songbird")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
