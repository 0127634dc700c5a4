//! Per-unit build outcomes and the aggregated report.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use crate::error::FailureKind;
use crate::unit::CompilationUnit;

/// How a single build attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    ToolchainFailure,
    Timeout,
    CacheHit,
    Cancelled,
}

impl BuildStatus {
    /// True for outcomes that produced a usable artifact.
    pub fn is_ok(&self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::CacheHit)
    }

    /// Failure classification, if this status is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            BuildStatus::Success | BuildStatus::CacheHit => None,
            BuildStatus::ToolchainFailure => Some(FailureKind::ToolchainFailure),
            BuildStatus::Timeout => Some(FailureKind::Timeout),
            BuildStatus::Cancelled => Some(FailureKind::Cancelled),
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStatus::Success => "success",
            BuildStatus::ToolchainFailure => "toolchain failure",
            BuildStatus::Timeout => "timeout",
            BuildStatus::CacheHit => "cache hit",
            BuildStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of one invocation attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub unit_name: String,
    pub status: BuildStatus,
    /// Location of the artifact; set for `Success` and `CacheHit`.
    pub artifact_path: Option<PathBuf>,
    /// Companion debug map written by the toolchain, if any.
    pub debug_map_path: Option<PathBuf>,
    /// Inputs the toolchain reported reading.
    pub declared_inputs: Vec<PathBuf>,
    /// Diagnostic lines in the order they were emitted.
    pub diagnostics: Vec<String>,
    pub duration_ms: u64,
}

impl BuildResult {
    pub(crate) fn failed(
        unit: &CompilationUnit,
        status: BuildStatus,
        diagnostics: Vec<String>,
        started: Instant,
    ) -> Self {
        Self {
            unit_name: unit.name.clone(),
            status,
            artifact_path: None,
            debug_map_path: None,
            declared_inputs: Vec::new(),
            diagnostics,
            duration_ms: elapsed_ms(started),
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Outcome for one unit after the whole pipeline ran.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub build: BuildResult,
    /// Set when the unit failed at any stage.
    pub failure: Option<FailureKind>,
    /// Files written for this unit.
    pub emitted: Vec<PathBuf>,
    /// Exported symbol names of the produced module.
    pub exports: Vec<String>,
    /// Non-fatal problems, such as a malformed debug map.
    pub warnings: Vec<UnitWarning>,
}

/// A problem the unit recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitWarning {
    pub kind: FailureKind,
    pub message: String,
}

impl UnitReport {
    pub fn unit_name(&self) -> &str {
        &self.build.unit_name
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Diagnostics worth showing for this unit.
    pub fn diagnostics(&self) -> &[String] {
        &self.build.diagnostics
    }
}

/// One failed unit, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure<'a> {
    pub unit_name: &'a str,
    pub kind: FailureKind,
    pub diagnostics: &'a [String],
}

/// Aggregated result of a multi-unit build.
///
/// Partial success is representable: each unit carries its own outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub units: Vec<UnitReport>,
    pub duration_ms: u64,
}

impl BuildReport {
    /// True only when every unit succeeded.
    pub fn is_success(&self) -> bool {
        self.units.iter().all(UnitReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = UnitFailure<'_>> {
        self.units.iter().filter_map(|unit| {
            unit.failure.map(|kind| UnitFailure {
                unit_name: unit.unit_name(),
                kind,
                diagnostics: unit.diagnostics(),
            })
        })
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.unit_name() == name)
    }

    pub fn cache_hits(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.build.status == BuildStatus::CacheHit)
            .count()
    }
}
