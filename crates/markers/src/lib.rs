//! Diagnostic marker registry.
//!
//! Tracks markers (errors, warnings, infos, hints, or any other entry type)
//! keyed by resource and owner. Each (resource, owner) pair holds one
//! collection which producers replace wholesale with
//! [`MarkerRegistry::set_markers`]; readers query it synchronously with
//! [`MarkerRegistry::find_markers`] and friends, and listeners are notified
//! whenever a collection actually changes.
//!
//! [`ProblemManager`] is the registry specialised to
//! [`lsp_types::Diagnostic`], adding severity statistics.
//!
//! ```
//! use xeno_markers::lsp_types::{Diagnostic, DiagnosticSeverity};
//! use xeno_markers::{ProblemManager, ResourceKey, SearchFilter};
//!
//! let problems = ProblemManager::problems();
//! let uri = ResourceKey::new("file:///src/main.rs");
//! problems.set_markers(&uri, "rustc", vec![Diagnostic {
//! 	severity: Some(DiagnosticSeverity::ERROR),
//! 	message: "mismatched types".into(),
//! 	..Default::default()
//! }]);
//!
//! assert_eq!(problems.find_markers(&SearchFilter::new().owner("rustc")).len(), 1);
//! assert_eq!(problems.problem_stat().errors, 1);
//! ```
//!
//! Registries are memory-only unless opened with persistence enabled through
//! [`MarkersConfig`] or given a [`MarkerStorage`] backend.
#![warn(missing_docs)]

/// Re-export of the [`lsp_types`] dependency of this crate.
pub use lsp_types;

mod config;
mod error;
mod events;
mod filter;
mod marker;
mod problem;
mod registry;
mod resource;
mod storage;

pub use config::{DEFAULT_KIND, MarkersConfig};
pub use error::{Error, Result};
pub use events::{ListenerId, MarkersChanged, MarkersChangedReceiver};
pub use filter::SearchFilter;
pub use marker::{Marker, MarkerCollection};
pub use problem::{PROBLEM_KIND, ProblemManager, ProblemStat};
pub use registry::{MarkerRegistry, storage_key};
pub use resource::ResourceKey;
pub use storage::{FileStorage, MarkerStorage, MemoryStorage};
