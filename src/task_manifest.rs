//! Pin editing inside task-list manifests.
//!
//! Task files are YAML on disk, but the editor works line by line so
//! comments, ordering and formatting survive the rewrite. Two line
//! shapes carry pins:
//!
//! ```yaml
//!     - Flask==3.0.2            # LIST_ITEM
//!     name: Flask==3.0.2        # SINGLE_ITEM
//! ```

use crate::package_name::PackageName;
use crate::version::Version;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Result of a task-manifest pin update, reported per file in the final
/// summary. `Error` is collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSetOutcome {
    /// At least one line changed; `old` is the version the first
    /// matching line carried before the rewrite.
    Updated { old: String },
    /// The pin exists and already carries the requested version.
    Unchanged,
    NotFound,
    Error(String),
}

/// Rewrite every pin occurrence of `name` in `path` to `version`,
/// preserving the spelling of the name as written in the file.
pub fn set_pin(path: &Path, name: &PackageName, version: &Version) -> TaskSetOutcome {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return TaskSetOutcome::Error(format!("cannot read {}: {e}", path.display())),
    };

    let name_pattern = separator_tolerant_pattern(name);
    let list_item = Regex::new(&format!(
        r"(?i)^(\s*-\s+)({name_pattern})==(\S+)(.*)$"
    ))
    .expect("static pattern shape");
    let single_item = Regex::new(&format!(
        r"(?i)^(\s*name:\s+)({name_pattern})==(\S+)(.*)$"
    ))
    .expect("static pattern shape");

    let new_version = version.to_string();
    let mut first_old: Option<String> = None;
    let mut found = false;
    let mut updated = false;

    let rewritten: Vec<String> = content
        .split('\n')
        .map(|line| {
            let captures = list_item.captures(line).or_else(|| single_item.captures(line));
            let Some(caps) = captures else {
                return line.to_string();
            };
            found = true;
            let (prefix, as_written, old, suffix) = (&caps[1], &caps[2], &caps[3], &caps[4]);
            if first_old.is_none() {
                first_old = Some(old.to_string());
            }
            if old == new_version {
                return line.to_string();
            }
            updated = true;
            info!(
                "changing '{}' to '{as_written}=={new_version}' in {}",
                line.trim(),
                path.display()
            );
            format!("{prefix}{as_written}=={new_version}{suffix}")
        })
        .collect();

    if updated {
        if let Err(e) = fs::write(path, rewritten.join("\n")) {
            return TaskSetOutcome::Error(format!("cannot write {}: {e}", path.display()));
        }
        TaskSetOutcome::Updated {
            old: first_old.unwrap_or_default(),
        }
    } else if found {
        TaskSetOutcome::Unchanged
    } else {
        warn!(
            "no pin for '{name}' found in {} (case-insensitive search)",
            path.display()
        );
        TaskSetOutcome::NotFound
    }
}

/// A match pattern for the name where `-`, `_` and `.` are equivalent,
/// mirroring how names are canonicalized everywhere else.
fn separator_tolerant_pattern(name: &PackageName) -> String {
    name.as_source_str()
        .chars()
        .map(|c| match c {
            '-' | '_' | '.' => "[-_.]".to_string(),
            other => regex::escape(&other.to_string()),
        })
        .collect()
}
