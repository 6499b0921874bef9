//! netdiff library
//!
//! Pre/post change analysis for network device command captures: parse
//! capture trees, mask volatile fields, diff per command, answer questions
//! about what changed.

pub mod analysis;
pub mod config;
pub mod differ;
pub mod error;
pub mod masker;
pub mod parser;
pub mod query;
pub mod session;

pub use analysis::AnalysisContext;
pub use config::Config;
pub use differ::{CommandDiff, DeviceDiff, DiffEngine};
pub use error::{AnalysisError, Result};
pub use masker::Masker;
pub use parser::{CaptureMap, CapturePair, CommandRecord, DeviceCapture, Phase};
pub use query::{Intent, QueryEngine, QueryResult};
pub use session::{AnalysisSession, SessionStore};
