//! Parser for network device command/output captures.
//!
//! Capture files record a CLI session in the format:
//!
//! ```text
//! command: show version
//! <output lines>
//! command: show ip interface brief
//! <output lines>
//! ```
//!
//! A line matching `command: <name>` (case-insensitive, surrounding
//! whitespace ignored) starts a new record; everything up to the next marker
//! is that command's output, kept verbatim including line terminators.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{AnalysisError, Result};

static COMMAND_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^command:\s*(.+)$").expect("valid marker pattern"));

/// Glob shapes tried in order when locating a phase file inside a device
/// directory: `*pre*.log`, `*pre*.txt` (and the post equivalents). The first
/// shape with any match wins; ties are broken lexicographically.
const PRE_GLOBS: &[(&str, &str)] = &[("pre", ".log"), ("pre", ".txt")];
const POST_GLOBS: &[(&str, &str)] = &[("post", ".log"), ("post", ".txt")];

/// Which side of the change a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pre => "PRE",
            Phase::Post => "POST",
        }
    }
}

/// A single command and its raw output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandRecord {
    pub command: String,
    /// Raw output text, line terminators preserved.
    pub output: String,
    /// 1-based line number of the `command:` marker.
    pub start_line: usize,
    /// 1-based line number of the last output line.
    pub end_line: usize,
}

/// One device's capture for one phase.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceCapture {
    pub hostname: String,
    pub change_id: String,
    pub phase: Phase,
    pub records: Vec<CommandRecord>,
}

impl DeviceCapture {
    /// Find a record by command name (exact match after trimming).
    ///
    /// Scans in capture order and returns the first occurrence.
    pub fn record_by_name(&self, name: &str) -> Option<&CommandRecord> {
        let wanted = name.trim();
        self.records.iter().find(|r| r.command.trim() == wanted)
    }

    /// Name-indexed view of the records.
    ///
    /// When a command name repeats, the last occurrence wins; earlier
    /// duplicates are not reachable through this map.
    pub fn name_map(&self) -> BTreeMap<&str, &CommandRecord> {
        self.records
            .iter()
            .map(|r| (r.command.as_str(), r))
            .collect()
    }
}

/// The pre/post captures for one device. Either side may be absent; a
/// missing phase is a normal state, not an error.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CapturePair {
    pub pre: Option<DeviceCapture>,
    pub post: Option<DeviceCapture>,
}

/// All parsed devices for one change, keyed by hostname (sorted order).
pub type CaptureMap = BTreeMap<String, CapturePair>;

/// Parse capture file content into an ordered record sequence.
///
/// Lines before the first marker are discarded. Empty input yields an empty
/// list.
pub fn parse_content(content: &str) -> Vec<CommandRecord> {
    let mut records = Vec::new();
    let mut current: Option<(String, usize)> = None;
    let mut output = String::new();
    let mut last_line = 0;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let line_num = idx + 1;
        last_line = line_num;

        if let Some(caps) = COMMAND_MARKER.captures(line.trim()) {
            if let Some((command, start_line)) = current.take() {
                records.push(CommandRecord {
                    command,
                    output: std::mem::take(&mut output),
                    start_line,
                    end_line: line_num - 1,
                });
            }
            current = Some((caps[1].trim().to_string(), line_num));
        } else if current.is_some() {
            output.push_str(line);
        }
    }

    if let Some((command, start_line)) = current {
        records.push(CommandRecord {
            command,
            output,
            start_line,
            end_line: last_line,
        });
    }

    records
}

/// Parse a single capture file.
///
/// Undecodable byte sequences are replaced lossily and never raise.
pub fn parse_file(
    path: &Path,
    hostname: &str,
    change_id: &str,
    phase: Phase,
) -> Result<DeviceCapture> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);

    Ok(DeviceCapture {
        hostname: hostname.to_string(),
        change_id: change_id.to_string(),
        phase,
        records: parse_content(&content),
    })
}

/// Parse every device directory under `root`.
///
/// Expected layout:
///
/// ```text
/// <root>/                 <- directory name doubles as the change id
///   <hostname>/
///     *pre*.log or *pre*.txt
///     *post*.log or *post*.txt
/// ```
///
/// A device directory with neither a pre nor a post file is skipped. A
/// device with only one side yields a pair with the other phase absent. A
/// missing or non-directory `root` is an [`AnalysisError::InvalidInput`].
pub fn parse_capture_dir(root: &Path) -> Result<CaptureMap> {
    if !root.exists() {
        return Err(AnalysisError::InvalidInput(format!(
            "directory not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(AnalysisError::InvalidInput(format!(
            "path is not a directory: {}",
            root.display()
        )));
    }

    let change_id = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut device_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    device_dirs.sort();

    let mut devices = CaptureMap::new();

    for device_dir in device_dirs {
        let hostname = match device_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let pre_path = find_capture_file(&device_dir, PRE_GLOBS);
        let post_path = find_capture_file(&device_dir, POST_GLOBS);

        if pre_path.is_none() && post_path.is_none() {
            continue;
        }

        let pre = parse_side(pre_path.as_deref(), &hostname, &change_id, Phase::Pre);
        let post = parse_side(post_path.as_deref(), &hostname, &change_id, Phase::Post);

        if pre.is_none() && post.is_none() {
            continue;
        }

        devices.insert(hostname, CapturePair { pre, post });
    }

    Ok(devices)
}

/// All unique command names across every capture in the map, sorted.
pub fn all_command_names(devices: &CaptureMap) -> Vec<String> {
    let mut names = BTreeSet::new();
    for pair in devices.values() {
        for capture in [&pair.pre, &pair.post].into_iter().flatten() {
            for record in &capture.records {
                names.insert(record.command.clone());
            }
        }
    }
    names.into_iter().collect()
}

/// A read failure aborts only this device's side of the capture, never the
/// whole batch.
fn parse_side(
    path: Option<&Path>,
    hostname: &str,
    change_id: &str,
    phase: Phase,
) -> Option<DeviceCapture> {
    let path = path?;
    match parse_file(path, hostname, change_id, phase) {
        Ok(capture) => Some(capture),
        Err(err) => {
            tracing::warn!(
                "skipping {} capture for {}: {} ({})",
                phase.as_str(),
                hostname,
                path.display(),
                err
            );
            None
        }
    }
}

fn find_capture_file(dir: &Path, globs: &[(&str, &str)]) -> Option<PathBuf> {
    for (infix, suffix) in globs {
        let mut matches: Vec<PathBuf> = fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| name.contains(infix) && name.ends_with(suffix))
            })
            .collect();

        if !matches.is_empty() {
            matches.sort();
            return Some(matches.remove(0));
        }
    }
    None
}
