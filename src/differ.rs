//! Line-level diff engine for command outputs.
//!
//! Both sides are masked before diffing so volatile fields never register as
//! changes. The diff is a full line alignment with no context collapsing:
//! every line, changed or not, appears in the rendered table, which keeps
//! small outputs fully visible in reports.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;

use crate::masker::Masker;
use crate::parser::{CapturePair, DeviceCapture};

/// Classification of one rendered diff row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Context,
    Added,
    Removed,
}

/// One row of the rendered line table.
///
/// Line counters are 1-based and independent per side: the pre counter
/// advances on context and removed rows, the post counter on context and
/// added rows. Reports rely on these numbers matching the source captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    pub kind: RowKind,
    pub pre_line: Option<usize>,
    pub post_line: Option<usize>,
    pub text: String,
}

/// Diff result for a single command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDiff {
    pub command: String,
    pub has_changes: bool,
    /// Raw count of inserted lines.
    pub added_lines: usize,
    /// Raw count of deleted lines.
    pub removed_lines: usize,
    /// Approximation of lines modified in place: `min(added, removed)`.
    pub changed_lines: usize,
    pub masked_pre: String,
    pub masked_post: String,
    pub rendered: Vec<DiffRow>,
}

/// Aggregated diff for one device across all of its commands.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDiff {
    pub hostname: String,
    pub change_id: String,
    /// Ordered by command name ascending.
    pub command_diffs: Vec<CommandDiff>,
    pub total_commands: usize,
    pub commands_with_changes: usize,
    pub total_added: usize,
    pub total_removed: usize,
    pub total_changed: usize,
}

/// Computes masked line diffs per command and per device.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    masker: Masker,
    categories: Option<Vec<String>>,
}

impl DiffEngine {
    /// `categories` restricts masking to the given categories; `None` applies
    /// every loaded category.
    pub fn new(masker: Masker, categories: Option<Vec<String>>) -> Self {
        Self { masker, categories }
    }

    /// Diff a single command's pre and post output.
    pub fn diff_command(&self, command: &str, pre_output: &str, post_output: &str) -> CommandDiff {
        let masked_pre = self.masker.mask(pre_output, self.categories.as_deref());
        let masked_post = self.masker.mask(post_output, self.categories.as_deref());

        let diff = TextDiff::from_lines(&masked_pre, &masked_post);

        let mut rendered = Vec::new();
        let mut added = 0usize;
        let mut removed = 0usize;
        let mut pre_line = 1usize;
        let mut post_line = 1usize;

        for change in diff.iter_all_changes() {
            let text = change
                .value()
                .trim_end_matches('\n')
                .trim_end_matches('\r')
                .to_string();

            match change.tag() {
                ChangeTag::Equal => {
                    rendered.push(DiffRow {
                        kind: RowKind::Context,
                        pre_line: Some(pre_line),
                        post_line: Some(post_line),
                        text,
                    });
                    pre_line += 1;
                    post_line += 1;
                }
                ChangeTag::Delete => {
                    removed += 1;
                    rendered.push(DiffRow {
                        kind: RowKind::Removed,
                        pre_line: Some(pre_line),
                        post_line: None,
                        text,
                    });
                    pre_line += 1;
                }
                ChangeTag::Insert => {
                    added += 1;
                    rendered.push(DiffRow {
                        kind: RowKind::Added,
                        pre_line: None,
                        post_line: Some(post_line),
                        text,
                    });
                    post_line += 1;
                }
            }
        }

        CommandDiff {
            command: command.to_string(),
            has_changes: added > 0 || removed > 0,
            added_lines: added,
            removed_lines: removed,
            changed_lines: added.min(removed),
            masked_pre,
            masked_post,
            rendered,
        }
    }

    /// Diff one device's pre/post captures.
    ///
    /// The command set is the sorted union of names present in either phase;
    /// a command missing from one phase is diffed against empty text. Name
    /// lookup is last-wins on duplicates. Totals aggregate only commands
    /// that actually changed.
    pub fn diff_device(&self, pair: &CapturePair) -> Option<DeviceDiff> {
        let (hostname, change_id) = identity(pair)?;

        let empty = BTreeSet::new();
        let pre_map = pair.pre.as_ref().map(DeviceCapture::name_map);
        let post_map = pair.post.as_ref().map(DeviceCapture::name_map);

        let names: BTreeSet<&str> = pre_map
            .as_ref()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_else(|| empty.clone())
            .union(
                &post_map
                    .as_ref()
                    .map(|m| m.keys().copied().collect())
                    .unwrap_or(empty),
            )
            .copied()
            .collect();

        let mut command_diffs = Vec::with_capacity(names.len());
        let mut commands_with_changes = 0;
        let mut total_added = 0;
        let mut total_removed = 0;
        let mut total_changed = 0;

        for name in &names {
            let pre_output = pre_map
                .as_ref()
                .and_then(|m| m.get(name))
                .map(|r| r.output.as_str())
                .unwrap_or("");
            let post_output = post_map
                .as_ref()
                .and_then(|m| m.get(name))
                .map(|r| r.output.as_str())
                .unwrap_or("");

            let cmd_diff = self.diff_command(name, pre_output, post_output);
            if cmd_diff.has_changes {
                commands_with_changes += 1;
                total_added += cmd_diff.added_lines;
                total_removed += cmd_diff.removed_lines;
                total_changed += cmd_diff.changed_lines;
            }
            command_diffs.push(cmd_diff);
        }

        Some(DeviceDiff {
            hostname: hostname.to_string(),
            change_id: change_id.to_string(),
            total_commands: command_diffs.len(),
            command_diffs,
            commands_with_changes,
            total_added,
            total_removed,
            total_changed,
        })
    }
}

fn identity(pair: &CapturePair) -> Option<(&str, &str)> {
    pair.pre
        .as_ref()
        .or(pair.post.as_ref())
        .map(|c| (c.hostname.as_str(), c.change_id.as_str()))
}
