//! Analysis sessions and the in-memory session store.
//!
//! A session is written once by [`AnalysisSession::populate`] right after
//! creation and is read-only from then on. The store publishes sessions as
//! `Arc` values after population, so readers never observe a half-built
//! session. TTL is anchored to creation time: a busy session still expires
//! by wall-clock age, recency only protects against capacity eviction.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::differ::{CommandDiff, DeviceDiff};
use crate::parser::CaptureMap;

const MAX_SESSIONS: usize = 100;
const SESSION_TTL_MINUTES: i64 = 30;

/// Substrings of post-phase output that mark a command as having errors.
const OUTPUT_ERROR_MARKERS: &[&str] = &["error:", "failed", "failure", "%error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Changed,
    Unchanged,
    Errors,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Changed => "changed",
            DeviceStatus::Unchanged => "unchanged",
            DeviceStatus::Errors => "errors",
        }
    }
}

/// Lightweight per-device projection for listings. Carries counts and flags
/// only, never raw capture text.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub hostname: String,
    pub total_commands: usize,
    pub commands_with_changes: usize,
    pub commands_with_errors: usize,
    pub has_interface_changes: bool,
    pub has_bgp_changes: bool,
    pub has_ospf_changes: bool,
    pub status: DeviceStatus,
}

/// Per-command projection. Raw pre/post text stays in the owning
/// [`DeviceDiff`] and is fetched on demand.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSummary {
    pub command: String,
    pub has_changes: bool,
    pub added_lines: usize,
    pub removed_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatistics {
    pub total_devices: usize,
    pub changed_devices: usize,
    pub error_devices: usize,
    pub interface_changes: usize,
    pub bgp_changes: usize,
    pub ospf_changes: usize,
    pub total_commands: usize,
    pub commands_with_changes: usize,
}

/// One analyzed change, fully materialized in memory.
#[derive(Debug)]
pub struct AnalysisSession {
    pub session_id: String,
    pub change_id: String,
    pub created_at: DateTime<Utc>,
    pub devices: BTreeMap<String, DeviceSummary>,
    pub commands: BTreeMap<String, Vec<CommandSummary>>,
    pub device_diffs: BTreeMap<String, DeviceDiff>,
    pub captures: CaptureMap,
    /// `(hostname, command)` to position in that device's `command_diffs`.
    diff_index: HashMap<(String, String), usize>,
}

impl AnalysisSession {
    fn new(session_id: String, change_id: String) -> Self {
        Self {
            session_id,
            change_id,
            created_at: Utc::now(),
            devices: BTreeMap::new(),
            commands: BTreeMap::new(),
            device_diffs: BTreeMap::new(),
            captures: CaptureMap::new(),
            diff_index: HashMap::new(),
        }
    }

    /// One-time write of derived summaries. Must run before the session is
    /// published to the store.
    pub fn populate(&mut self, captures: CaptureMap, device_diffs: Vec<DeviceDiff>) {
        self.captures = captures;

        for diff in device_diffs {
            let hostname = diff.hostname.clone();

            let mut has_interface_changes = false;
            let mut has_bgp_changes = false;
            let mut has_ospf_changes = false;
            let mut commands_with_errors = 0;
            let mut summaries = Vec::with_capacity(diff.command_diffs.len());

            for (idx, cmd) in diff.command_diffs.iter().enumerate() {
                let name = cmd.command.to_lowercase();
                if name.contains("interface") || name.contains("ip int") {
                    has_interface_changes |= cmd.has_changes;
                } else if name.contains("bgp") {
                    has_bgp_changes |= cmd.has_changes;
                } else if name.contains("ospf") {
                    has_ospf_changes |= cmd.has_changes;
                }

                let output = cmd.masked_post.to_lowercase();
                if OUTPUT_ERROR_MARKERS.iter().any(|m| output.contains(m)) {
                    commands_with_errors += 1;
                }

                summaries.push(CommandSummary {
                    command: cmd.command.clone(),
                    has_changes: cmd.has_changes,
                    added_lines: cmd.added_lines,
                    removed_lines: cmd.removed_lines,
                });

                self.diff_index
                    .insert((hostname.clone(), cmd.command.clone()), idx);
            }

            let status = if diff.commands_with_changes > 0 {
                DeviceStatus::Changed
            } else if commands_with_errors > 0 {
                DeviceStatus::Errors
            } else {
                DeviceStatus::Unchanged
            };

            self.devices.insert(
                hostname.clone(),
                DeviceSummary {
                    hostname: hostname.clone(),
                    total_commands: diff.total_commands,
                    commands_with_changes: diff.commands_with_changes,
                    commands_with_errors,
                    has_interface_changes,
                    has_bgp_changes,
                    has_ospf_changes,
                    status,
                },
            );
            self.commands.insert(hostname.clone(), summaries);
            self.device_diffs.insert(hostname, diff);
        }
    }

    pub fn statistics(&self) -> SessionStatistics {
        let devices = self.devices.values();
        SessionStatistics {
            total_devices: self.devices.len(),
            changed_devices: devices.clone().filter(|d| d.commands_with_changes > 0).count(),
            error_devices: devices.clone().filter(|d| d.commands_with_errors > 0).count(),
            interface_changes: devices.clone().filter(|d| d.has_interface_changes).count(),
            bgp_changes: devices.clone().filter(|d| d.has_bgp_changes).count(),
            ospf_changes: devices.clone().filter(|d| d.has_ospf_changes).count(),
            total_commands: devices.clone().map(|d| d.total_commands).sum(),
            commands_with_changes: devices.map(|d| d.commands_with_changes).sum(),
        }
    }

    /// One page of device summaries plus the filtered total. Pages are
    /// 1-based; page 0 reads as page 1.
    pub fn devices_paginated(
        &self,
        page: usize,
        page_size: usize,
        status: Option<DeviceStatus>,
    ) -> (Vec<&DeviceSummary>, usize) {
        let filtered: Vec<&DeviceSummary> = self
            .devices
            .values()
            .filter(|d| match status {
                None => true,
                Some(DeviceStatus::Changed) => d.commands_with_changes > 0,
                Some(DeviceStatus::Unchanged) => d.commands_with_changes == 0,
                Some(DeviceStatus::Errors) => d.commands_with_errors > 0,
            })
            .collect();

        let total = filtered.len();
        let start = (page.max(1) - 1) * page_size;
        let page_items = filtered
            .into_iter()
            .skip(start)
            .take(page_size)
            .collect();

        (page_items, total)
    }

    /// Command summaries for one device; empty for an unknown hostname.
    pub fn device_commands(&self, hostname: &str, changed_only: bool) -> Vec<&CommandSummary> {
        self.commands
            .get(hostname)
            .map(|cmds| {
                cmds.iter()
                    .filter(|c| !changed_only || c.has_changes)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Full diff for one command, including masked raw text and the rendered
    /// line table.
    pub fn command_diff(&self, hostname: &str, command: &str) -> Option<&CommandDiff> {
        let idx = *self
            .diff_index
            .get(&(hostname.to_string(), command.to_string()))?;
        self.device_diffs
            .get(hostname)
            .and_then(|d| d.command_diffs.get(idx))
    }

    /// Hostnames containing the query, case-insensitive.
    pub fn search_devices(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.devices
            .keys()
            .filter(|h| h.to_lowercase().contains(&query))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub change_id: String,
    pub created_at: DateTime<Utc>,
    pub device_count: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<String, Arc<AnalysisSession>>,
    /// Session ids oldest-created first.
    creation: Vec<String>,
    /// Session ids least-recently-used first.
    recency: Vec<String>,
}

/// Concurrent TTL+LRU session store.
///
/// All bookkeeping lives behind one mutex; critical sections are short.
/// Lookups return absence, never errors.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_SESSIONS, Duration::minutes(SESSION_TTL_MINUTES))
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            capacity,
            ttl,
        }
    }

    /// Allocate a fresh unpublished session and run the cleanup pass.
    ///
    /// The returned session is owned by the caller and invisible to lookups
    /// until [`publish`](Self::publish). Cleanup drops every expired session
    /// first, then evicts least-recently-used entries until there is room
    /// for the session being created.
    pub fn create(&self, change_id: &str) -> AnalysisSession {
        let session = AnalysisSession::new(Uuid::new_v4().to_string(), change_id.to_string());

        let mut inner = self.inner.lock().unwrap();
        self.cleanup(&mut inner);

        session
    }

    /// Publish a populated session, making it visible to lookups as the
    /// most-recently-used entry.
    pub fn publish(&self, session: AnalysisSession) -> Arc<AnalysisSession> {
        let session = Arc::new(session);
        let id = session.session_id.clone();

        let mut inner = self.inner.lock().unwrap();
        inner.sessions.insert(id.clone(), Arc::clone(&session));
        inner.creation.push(id.clone());
        inner.recency.push(id);

        session
    }

    /// Lookup by session id, marking the entry most-recently-used. Does not
    /// touch the TTL clock.
    pub fn get(&self, session_id: &str) -> Option<Arc<AnalysisSession>> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner.sessions.get(session_id).cloned()?;

        if let Some(pos) = inner.recency.iter().position(|id| id == session_id) {
            let id = inner.recency.remove(pos);
            inner.recency.push(id);
        }

        Some(session)
    }

    /// The most recently created session for a change id. Not a use for
    /// recency purposes.
    pub fn get_by_change(&self, change_id: &str) -> Option<Arc<AnalysisSession>> {
        let inner = self.inner.lock().unwrap();
        inner
            .creation
            .iter()
            .rev()
            .filter_map(|id| inner.sessions.get(id))
            .find(|s| s.change_id == change_id)
            .cloned()
    }

    /// Remove a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let existed = inner.sessions.remove(session_id).is_some();
        if existed {
            inner.creation.retain(|id| id != session_id);
            inner.recency.retain(|id| id != session_id);
        }
        existed
    }

    /// Active sessions in creation order.
    pub fn list(&self) -> Vec<SessionInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .creation
            .iter()
            .filter_map(|id| inner.sessions.get(id))
            .map(|s| SessionInfo {
                session_id: s.session_id.clone(),
                change_id: s.change_id.clone(),
                created_at: s.created_at,
                device_count: s.devices.len(),
            })
            .collect()
    }

    fn cleanup(&self, inner: &mut StoreInner) {
        let now = Utc::now();

        let expired: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| now.signed_duration_since(s.created_at) > self.ttl)
            .map(|s| s.session_id.clone())
            .collect();
        for id in &expired {
            inner.sessions.remove(id);
        }
        if !expired.is_empty() {
            inner.creation.retain(|id| !expired.contains(id));
            inner.recency.retain(|id| !expired.contains(id));
        }

        // Leave room for the session about to be published.
        while inner.sessions.len() > self.capacity.saturating_sub(1) {
            let lru = inner.recency.remove(0);
            inner.sessions.remove(&lru);
            inner.creation.retain(|id| id != &lru);
        }
    }
}
