//! Problem markers: the registry specialised to LSP diagnostics.

use lsp_types::{Diagnostic, DiagnosticSeverity};
use serde::{Deserialize, Serialize};

use crate::{MarkerRegistry, MarkersConfig, ResourceKey, Result};

/// Kind label of the problem registry.
pub const PROBLEM_KIND: &str = "problem";

/// Registry of diagnostics reported by language servers, linters and builds.
pub type ProblemManager = MarkerRegistry<Diagnostic>;

/// Per-severity counts of all problems.
///
/// Hints and diagnostics without a recognised severity are counted in their
/// own buckets rather than being folded into errors or infos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemStat {
	/// Diagnostics with [`DiagnosticSeverity::ERROR`].
	pub errors: usize,
	/// Diagnostics with [`DiagnosticSeverity::WARNING`].
	pub warnings: usize,
	/// Diagnostics with [`DiagnosticSeverity::INFORMATION`].
	pub infos: usize,
	/// Diagnostics with [`DiagnosticSeverity::HINT`].
	pub hints: usize,
	/// Diagnostics with no severity, or one outside the LSP range.
	pub unspecified: usize,
}

impl ProblemStat {
	/// Total number of diagnostics counted.
	pub fn total(&self) -> usize {
		self.errors + self.warnings + self.infos + self.hints + self.unspecified
	}

	fn record(&mut self, severity: Option<DiagnosticSeverity>) {
		match severity {
			Some(DiagnosticSeverity::ERROR) => self.errors += 1,
			Some(DiagnosticSeverity::WARNING) => self.warnings += 1,
			Some(DiagnosticSeverity::INFORMATION) => self.infos += 1,
			Some(DiagnosticSeverity::HINT) => self.hints += 1,
			_ => self.unspecified += 1,
		}
	}
}

/// Rank for comparing severities; higher is more severe, 0 is unclassified.
fn severity_rank(severity: Option<DiagnosticSeverity>) -> u8 {
	match severity {
		Some(DiagnosticSeverity::ERROR) => 4,
		Some(DiagnosticSeverity::WARNING) => 3,
		Some(DiagnosticSeverity::INFORMATION) => 2,
		Some(DiagnosticSeverity::HINT) => 1,
		_ => 0,
	}
}

impl MarkerRegistry<Diagnostic> {
	/// Create an empty, memory-only problem registry.
	pub fn problems() -> Self {
		Self::with_kind(PROBLEM_KIND)
	}

	/// Opens a problem registry as described by `config`.
	///
	/// Like [`MarkerRegistry::open`], but the kind falls back to
	/// [`PROBLEM_KIND`], so snapshots land under `markers-problem`.
	pub fn open_problems(config: &MarkersConfig) -> Result<Self> {
		Self::open_as(config, PROBLEM_KIND)
	}

	/// Counts all current diagnostics by severity.
	pub fn problem_stat(&self) -> ProblemStat {
		let mut stat = ProblemStat::default();
		self.for_each_problem(None, |diag| stat.record(diag.severity));
		stat
	}

	/// Most severe classified severity among the diagnostics of `resource`.
	///
	/// Used to decorate resources in trees and tabs. Returns `None` when the
	/// resource has no diagnostics with a recognised severity.
	pub fn highest_severity(&self, resource: &ResourceKey) -> Option<DiagnosticSeverity> {
		let mut highest: Option<DiagnosticSeverity> = None;
		self.for_each_problem(Some(resource), |diag| {
			if severity_rank(diag.severity) > severity_rank(highest) {
				highest = diag.severity;
			}
		});
		highest
	}

	fn for_each_problem(&self, resource: Option<&ResourceKey>, mut visit: impl FnMut(&Diagnostic)) {
		let scanned: Result<(), std::convert::Infallible> = self.scan(resource, None, |_, _, diag| {
			visit(diag);
			Ok(())
		});
		if let Err(never) = scanned {
			match never {}
		}
	}
}

#[cfg(test)]
mod tests {
	use lsp_types::{Position, Range};
	use pretty_assertions::assert_eq;

	use super::*;

	fn diag(severity: Option<DiagnosticSeverity>, message: &str) -> Diagnostic {
		Diagnostic {
			range: Range::new(Position::new(1, 1), Position::new(1, 1)),
			severity,
			message: message.into(),
			..Default::default()
		}
	}

	#[test]
	fn problems_registry_has_problem_kind() {
		assert_eq!(ProblemManager::problems().kind(), "problem");
	}

	#[test]
	fn open_problems_defaults_to_problem_kind() {
		let manager = ProblemManager::open_problems(&MarkersConfig::default()).unwrap();
		assert_eq!(manager.kind(), PROBLEM_KIND);

		let custom = MarkersConfig {
			kind: Some("lint".into()),
			..Default::default()
		};
		assert_eq!(ProblemManager::open_problems(&custom).unwrap().kind(), "lint");
	}

	#[test]
	fn hints_and_missing_severity_get_their_own_buckets() {
		let manager = ProblemManager::problems();
		manager.set_markers(
			&ResourceKey::new("foo"),
			"bar",
			vec![
				diag(Some(DiagnosticSeverity::ERROR), "error"),
				diag(Some(DiagnosticSeverity::HINT), "hint-1"),
				diag(Some(DiagnosticSeverity::HINT), "hint-2"),
				diag(None, "unspecified"),
			],
		);

		let stat = manager.problem_stat();
		assert_eq!(
			stat,
			ProblemStat {
				errors: 1,
				warnings: 0,
				infos: 0,
				hints: 2,
				unspecified: 1,
			}
		);
		assert_eq!(stat.total(), 4);
	}

	#[test]
	fn stat_spans_resources_and_owners() {
		let manager = ProblemManager::problems();
		manager.set_markers(
			&ResourceKey::new("a"),
			"rustc",
			vec![diag(Some(DiagnosticSeverity::ERROR), "e")],
		);
		manager.set_markers(
			&ResourceKey::new("a"),
			"clippy",
			vec![diag(Some(DiagnosticSeverity::WARNING), "w")],
		);
		manager.set_markers(
			&ResourceKey::new("b"),
			"rustc",
			vec![diag(Some(DiagnosticSeverity::INFORMATION), "i")],
		);

		let stat = manager.problem_stat();
		assert_eq!((stat.errors, stat.warnings, stat.infos), (1, 1, 1));
	}

	#[test]
	fn highest_severity_per_resource() {
		let manager = ProblemManager::problems();
		let a = ResourceKey::new("a");
		let b = ResourceKey::new("b");
		manager.set_markers(
			&a,
			"lint",
			vec![
				diag(Some(DiagnosticSeverity::HINT), "h"),
				diag(Some(DiagnosticSeverity::WARNING), "w"),
				diag(None, "n"),
			],
		);
		manager.set_markers(&b, "lint", vec![diag(None, "n")]);

		assert_eq!(manager.highest_severity(&a), Some(DiagnosticSeverity::WARNING));
		assert_eq!(manager.highest_severity(&b), None);
		assert_eq!(manager.highest_severity(&ResourceKey::new("c")), None);

		manager.set_markers(&b, "build", vec![diag(Some(DiagnosticSeverity::ERROR), "e")]);
		assert_eq!(manager.highest_severity(&b), Some(DiagnosticSeverity::ERROR));
	}
}
