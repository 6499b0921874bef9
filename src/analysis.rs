//! End-to-end analysis: parse a capture tree, diff every device and publish
//! the result as a session.

use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::differ::{DeviceDiff, DiffEngine};
use crate::error::{AnalysisError, Result};
use crate::masker::{profile_categories, Masker};
use crate::parser::{self, CaptureMap};
use crate::session::{AnalysisSession, SessionStore};

/// Everything an analysis run needs, constructed once at startup and passed
/// by reference. No global state.
pub struct AnalysisContext {
    config: Config,
    masker: Masker,
    store: SessionStore,
}

impl AnalysisContext {
    pub fn new(config: Config) -> Self {
        let masker = Masker::from_config(&config.masking);
        Self {
            config,
            masker,
            store: SessionStore::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Analyze a capture tree and publish the resulting session.
    ///
    /// `profile` overrides the configured masking profile for this run.
    /// Devices are diffed in parallel; the result order is by hostname, never
    /// by completion order.
    pub fn analyze(&self, root: &Path, profile: Option<&str>) -> Result<Arc<AnalysisSession>> {
        let captures = parser::parse_capture_dir(root)?;
        if captures.is_empty() {
            return Err(AnalysisError::NotFound(format!(
                "no capture files found under {}",
                root.display()
            )));
        }

        let change_id = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let profile = profile.unwrap_or(&self.config.diff.masking_profile);
        let categories = profile_categories(profile)?;
        let engine = DiffEngine::new(self.masker.clone(), categories);

        let diffs = self.diff_all(&engine, &captures)?;

        let mut session = self.store.create(&change_id);
        session.populate(captures, diffs);
        Ok(self.store.publish(session))
    }

    fn diff_all(&self, engine: &DiffEngine, captures: &CaptureMap) -> Result<Vec<DeviceDiff>> {
        let pairs: Vec<_> = captures.values().collect();

        let mut diffs: Vec<DeviceDiff> = match self.config.performance.max_workers {
            0 => pairs
                .par_iter()
                .filter_map(|pair| engine.diff_device(pair))
                .collect(),
            n => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| {
                        AnalysisError::Config(format!("failed to build worker pool: {}", e))
                    })?;
                pool.install(|| {
                    pairs
                        .par_iter()
                        .filter_map(|pair| engine.diff_device(pair))
                        .collect()
                })
            }
        };

        diffs.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(diffs)
    }
}
