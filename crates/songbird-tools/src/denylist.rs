// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shell command denylist.
//!
//! A fixed set of patently destructive command patterns that `shell_exec`
//! refuses regardless of user intent.  The check runs before any subprocess
//! is spawned; a hit produces `success: false` with the matched pattern in
//! the error message.  This is a denylist, not a sandbox — anything not
//! matched runs with the user's full privileges.

use regex::Regex;
use std::sync::OnceLock;

/// Built-in destructive patterns.  Matched case-insensitively against the
/// whole command string.
const PATTERNS: &[(&str, &str)] = &[
    (r"\brm\s+(-[a-z]*\s+)*-[a-z]*[rf][a-z]*\s+(-[a-z]*\s+)*/(\s|$)", "recursive deletion of /"),
    (r"\brm\s+-rf\s+/\S*\s*", "recursive force deletion from root"),
    (r"\bsudo\s+rm\b", "privileged rm"),
    (r"\bmkfs(\.\w+)?\b", "filesystem format"),
    (r"\bdd\s+[^|;]*of=/dev/", "raw write to a block device"),
    (r">\s*/dev/(sd|nvme|hd|vd)", "redirect onto a block device"),
    (r":\(\)\s*\{\s*:\|:&\s*\}\s*;\s*:", "fork bomb"),
    (r"\bchmod\s+(-[a-z]+\s+)*777\s+/(\s|$)", "world-writable root"),
    (r"\bchown\s+(-[a-z]+\s+)*\S+\s+/(\s|$)", "ownership change of /"),
    (r"(^|;|&&|\|\|)\s*(sudo\s+)?(shutdown|reboot|halt|poweroff)\b", "power control"),
];

fn compiled() -> &'static Vec<(Regex, &'static str)> {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|(p, why)| (Regex::new(&format!("(?i){p}")).expect("static pattern"), *why))
            .collect()
    })
}

/// Returns the reason a command is refused, or `None` when it may run.
pub fn deny_reason(command: &str) -> Option<&'static str> {
    compiled()
        .iter()
        .find(|(re, _)| re.is_match(command))
        .map(|(_, why)| *why)
}

/// Extra user-configured patterns in simple glob syntax (`*`, `?`).
#[derive(Debug, Default)]
pub struct ExtraDenylist {
    patterns: Vec<Regex>,
}

impl ExtraDenylist {
    pub fn from_globs(globs: &[String]) -> Self {
        Self {
            patterns: globs.iter().filter_map(|g| glob_to_regex(g)).collect(),
        }
    }

    pub fn matches(&self, command: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(command))
    }
}

/// Convert a simple shell glob pattern to a [`Regex`].
/// Only `*` (match anything) and `?` (match one char) are supported.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rm_rf_root_is_denied() {
        assert!(deny_reason("rm -rf /").is_some());
        assert!(deny_reason("rm -rf /*").is_some());
        assert!(deny_reason("sudo rm -rf /home").is_some());
    }

    #[test]
    fn rm_in_a_subdirectory_is_allowed() {
        assert!(deny_reason("rm -rf ./build").is_none());
        assert!(deny_reason("rm foo.txt").is_none());
    }

    #[test]
    fn mkfs_is_denied() {
        assert!(deny_reason("mkfs.ext4 /dev/sda1").is_some());
        assert!(deny_reason("mkfs /dev/sdb").is_some());
    }

    #[test]
    fn raw_disk_writes_are_denied() {
        assert!(deny_reason("dd if=/dev/zero of=/dev/sda").is_some());
        assert!(deny_reason("echo x > /dev/sda").is_some());
    }

    #[test]
    fn dd_to_a_file_is_allowed() {
        assert!(deny_reason("dd if=/dev/zero of=./image.bin bs=1M count=1").is_none());
    }

    #[test]
    fn fork_bomb_is_denied() {
        assert!(deny_reason(":(){ :|:& };:").is_some());
    }

    #[test]
    fn chmod_777_root_is_denied_but_local_is_not() {
        assert!(deny_reason("chmod -R 777 /").is_some());
        assert!(deny_reason("chmod 777 ./script.sh").is_none());
    }

    #[test]
    fn power_control_is_denied() {
        assert!(deny_reason("shutdown -h now").is_some());
        assert!(deny_reason("reboot").is_some());
    }

    #[test]
    fn case_is_ignored() {
        assert!(deny_reason("RM -RF /").is_some());
    }

    #[test]
    fn ordinary_commands_pass() {
        for cmd in ["ls -la", "git status", "cargo build", "python3 hello.py", "grep -r foo ."] {
            assert!(deny_reason(cmd).is_none(), "{cmd} should be allowed");
        }
    }

    #[test]
    fn extra_globs_match() {
        let extra = ExtraDenylist::from_globs(&["git push*".to_string()]);
        assert!(extra.matches("git push origin main"));
        assert!(!extra.matches("git pull"));
    }
}
