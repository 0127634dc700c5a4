//! Build pipeline: resolve, fingerprint, compile or reuse, adapt, emit.
//!
//! Units run concurrently; a failing unit is recorded in its report and never
//! stops its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tokio::task::JoinSet;

use crate::adapter::{self, ModuleDescriptor};
use crate::cache::{ArtifactCache, BuildFingerprint, CachedArtifact, fingerprint};
use crate::context::BuildContext;
use crate::debugmap::{self, Embedding};
use crate::error::{FailureKind, Result};
use crate::resolver;
use crate::result::{
    BuildReport, BuildResult, BuildStatus, UnitReport, UnitWarning, elapsed_ms,
};
use crate::unit::CompilationUnit;

/// Artifact bytes plus the build that produced (or reused) them.
struct Compiled {
    build: BuildResult,
    artifact: Vec<u8>,
    debug_map: Option<Vec<u8>>,
}

/// Resolve every configured entry and build them all.
///
/// Resolution errors are fatal and returned before any process is spawned.
/// Per-unit failures are carried in the report.
pub async fn build_all(ctx: &Arc<BuildContext>) -> Result<BuildReport> {
    let units = resolver::resolve(ctx.root(), ctx.config())?;
    Ok(build_units(ctx, units).await)
}

/// Build the given units concurrently, returning reports in input order.
pub async fn build_units(ctx: &Arc<BuildContext>, units: Vec<CompilationUnit>) -> BuildReport {
    let started = Instant::now();
    let generation = ctx.registry().begin_build();
    tracing::info!(units = units.len(), generation, "starting build");

    let order: Vec<CompilationUnit> = units.clone();
    let mut join_set = JoinSet::new();
    for unit in units {
        let ctx = Arc::clone(ctx);
        join_set.spawn(async move {
            let report = build_unit(&ctx, &unit).await;
            (unit.name, report)
        });
    }

    let mut finished: FxHashMap<String, UnitReport> = FxHashMap::default();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((name, report)) => {
                finished.insert(name, report);
            }
            Err(err) => tracing::error!(error = %err, "unit build task failed"),
        }
    }

    let units = order
        .iter()
        .map(|unit| {
            finished.remove(&unit.name).unwrap_or_else(|| {
                let build = BuildResult::failed(
                    unit,
                    BuildStatus::Cancelled,
                    vec!["error: unit build task ended unexpectedly".to_string()],
                    started,
                );
                failed_report(build)
            })
        })
        .collect();

    let report = BuildReport {
        units,
        duration_ms: elapsed_ms(started),
    };
    tracing::info!(
        success = report.is_success(),
        cache_hits = report.cache_hits(),
        duration_ms = report.duration_ms,
        "build finished"
    );
    report
}

/// Run one unit through the whole pipeline.
pub async fn build_unit(ctx: &BuildContext, unit: &CompilationUnit) -> UnitReport {
    let compiled = match compile(ctx, unit).await {
        Ok(compiled) => compiled,
        Err(build) => {
            tracing::info!(unit = %unit.name, status = %build.status, "unit failed");
            return failed_report(build);
        }
    };

    let Compiled {
        mut build,
        artifact,
        debug_map,
    } = compiled;

    // A rebuild replaces the unit's previous descriptor
    let descriptor = match adapter::describe(unit, &artifact, ctx.adapter_options()) {
        Ok(descriptor) => ctx.registry().replace(descriptor),
        Err(err) => {
            tracing::warn!(unit = %unit.name, error = %err, "artifact is not loadable");
            build.diagnostics.push(format!("error: {err}"));
            return UnitReport {
                build,
                failure: Some(FailureKind::Instantiation),
                emitted: Vec::new(),
                exports: Vec::new(),
                warnings: Vec::new(),
            };
        }
    };

    let mut warnings = Vec::new();
    let exports = descriptor.exported_symbols.iter().cloned().collect();

    match emit(ctx, unit, &descriptor, &artifact, debug_map.as_deref(), &mut warnings).await {
        Ok(emitted) => {
            tracing::info!(
                unit = %unit.name,
                status = %build.status,
                duration_ms = build.duration_ms,
                "unit built"
            );
            UnitReport {
                build,
                failure: None,
                emitted,
                exports,
                warnings,
            }
        }
        Err(err) => {
            tracing::warn!(unit = %unit.name, error = %err, "failed to write outputs");
            build
                .diagnostics
                .push(format!("error: failed to write outputs: {err}"));
            UnitReport {
                build,
                failure: Some(FailureKind::Emit),
                emitted: Vec::new(),
                exports,
                warnings,
            }
        }
    }
}

fn failed_report(build: BuildResult) -> UnitReport {
    UnitReport {
        failure: build.status.failure_kind(),
        build,
        emitted: Vec::new(),
        exports: Vec::new(),
        warnings: Vec::new(),
    }
}

/// Produce artifact bytes from the cache or the toolchain.
async fn compile(ctx: &BuildContext, unit: &CompilationUnit) -> Result<Compiled, BuildResult> {
    let started = Instant::now();
    let target_dir = ctx.target_dir();

    if ctx.is_cancelled() {
        return Err(BuildResult::failed(unit, BuildStatus::Cancelled, Vec::new(), started));
    }

    // Sources hash first; the key also needs the inputs the last build of
    // these sources reported outside the crate
    let sources = match ctx.cache() {
        Some(_) => compute_fingerprint(ctx, unit).await,
        None => None,
    };
    let fingerprint = match (ctx.cache(), sources.as_ref()) {
        (Some(cache), Some(sources)) => {
            let declared = cache
                .declared_inputs_for(sources)
                .or_else(|| ctx.last_declared_inputs(&unit.name))
                .unwrap_or_default();
            complete_fingerprint(ctx, unit, sources, declared).await
        }
        _ => None,
    };

    if let (Some(cache), Some(fp)) = (ctx.cache(), fingerprint.as_ref()) {
        if let Some(hit) = lookup(cache, fp).await {
            match restore(unit, &target_dir, &hit).await {
                Ok(build) => {
                    tracing::debug!(unit = %unit.name, fingerprint = %fp, "cache hit");
                    ctx.record_declared_inputs(&unit.name, &build.declared_inputs);
                    return Ok(Compiled {
                        build: BuildResult {
                            duration_ms: elapsed_ms(started),
                            ..build
                        },
                        artifact: hit.artifact_bytes.clone(),
                        debug_map: hit.debug_map_bytes.clone(),
                    });
                }
                Err(err) => {
                    tracing::warn!(unit = %unit.name, error = %err, "could not restore cached artifact");
                }
            }
        } else {
            tracing::debug!(unit = %unit.name, fingerprint = %fp, "cache miss");
        }
    }

    let _permit = ctx
        .acquire_slot(&unit.name)
        .await
        .map_err(|_| BuildResult::failed(unit, BuildStatus::Cancelled, Vec::new(), started))?;

    let mut build = ctx.invoker().invoke(unit, &target_dir).await;
    if !build.status.is_ok() {
        return Err(build);
    }

    let Some(artifact_path) = build.artifact_path.clone() else {
        build.status = BuildStatus::ToolchainFailure;
        return Err(build);
    };
    let artifact = match tokio::fs::read(&artifact_path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            build.status = BuildStatus::ToolchainFailure;
            build.diagnostics.push(format!(
                "error: could not read artifact {}: {err}",
                artifact_path.display()
            ));
            return Err(build);
        }
    };
    let debug_map = match &build.debug_map_path {
        Some(path) => tokio::fs::read(path).await.ok(),
        None => None,
    };

    ctx.record_declared_inputs(&unit.name, &build.declared_inputs);

    // Key the entry by what this build actually read
    let store_key = match sources.as_ref() {
        Some(sources) => {
            complete_fingerprint(ctx, unit, sources, build.declared_inputs.clone()).await
        }
        None => None,
    };
    if let (Some(cache), Some(fp)) = (ctx.cache(), store_key) {
        store(
            cache,
            fp,
            artifact.clone(),
            debug_map.clone(),
            build.declared_inputs.clone(),
        )
        .await;
    }

    Ok(Compiled {
        build,
        artifact,
        debug_map,
    })
}

async fn compute_fingerprint(ctx: &BuildContext, unit: &CompilationUnit) -> Option<BuildFingerprint> {
    let version = ctx.toolchain_version().await.to_string();
    let options = ctx.config().toolchain.clone();
    let excludes = ctx.fingerprint_excludes();
    let unit = unit.clone();

    let joined = tokio::task::spawn_blocking(move || {
        fingerprint::compute(&unit, &version, &options, &excludes)
    })
    .await;

    match joined {
        Ok(Ok(fp)) => Some(fp),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "could not fingerprint unit, skipping cache");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "fingerprint task failed, skipping cache");
            None
        }
    }
}

async fn complete_fingerprint(
    ctx: &BuildContext,
    unit: &CompilationUnit,
    sources: &BuildFingerprint,
    declared: Vec<PathBuf>,
) -> Option<BuildFingerprint> {
    let sources = sources.clone();
    let crate_dir = unit.crate_dir.clone();
    let excludes = ctx.fingerprint_excludes();

    let joined = tokio::task::spawn_blocking(move || {
        sources.with_declared_inputs(&crate_dir, &declared, &excludes)
    })
    .await;

    match joined {
        Ok(Ok(fp)) => Some(fp),
        Ok(Err(err)) => {
            tracing::warn!(unit = %unit.name, error = %err, "could not hash declared inputs, skipping cache");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "fingerprint task failed, skipping cache");
            None
        }
    }
}

async fn lookup(cache: &Arc<ArtifactCache>, fp: &BuildFingerprint) -> Option<Arc<CachedArtifact>> {
    let cache = Arc::clone(cache);
    let fp = fp.clone();
    tokio::task::spawn_blocking(move || cache.lookup(&fp))
        .await
        .ok()
        .flatten()
}

async fn store(
    cache: &Arc<ArtifactCache>,
    fp: BuildFingerprint,
    artifact: Vec<u8>,
    debug_map: Option<Vec<u8>>,
    declared_inputs: Vec<PathBuf>,
) {
    let cache = Arc::clone(cache);
    let joined = tokio::task::spawn_blocking(move || {
        cache.store(fp, artifact, debug_map, declared_inputs);
    })
    .await;
    if let Err(err) = joined {
        tracing::warn!(error = %err, "cache store task failed");
    }
}

/// Put cached bytes back where the toolchain would have written them.
async fn restore(
    unit: &CompilationUnit,
    target_dir: &Path,
    hit: &CachedArtifact,
) -> std::io::Result<BuildResult> {
    let artifact_path = unit.artifact_path(target_dir);
    tokio::fs::create_dir_all(unit.output_dir(target_dir)).await?;
    tokio::fs::write(&artifact_path, &hit.artifact_bytes).await?;

    let debug_map_path = match &hit.debug_map_bytes {
        Some(bytes) => {
            let path = unit.debug_map_path(target_dir);
            tokio::fs::write(&path, bytes).await?;
            Some(path)
        }
        None => None,
    };

    Ok(BuildResult {
        unit_name: unit.name.clone(),
        status: BuildStatus::CacheHit,
        artifact_path: Some(artifact_path),
        debug_map_path,
        declared_inputs: hit.declared_inputs.clone(),
        diagnostics: Vec::new(),
        duration_ms: 0,
    })
}

/// Write glue, artifact and debug map for one unit.
async fn emit(
    ctx: &BuildContext,
    unit: &CompilationUnit,
    descriptor: &ModuleDescriptor,
    artifact: &[u8],
    debug_map: Option<&[u8]>,
    warnings: &mut Vec<UnitWarning>,
) -> std::io::Result<Vec<PathBuf>> {
    let out_dir = ctx.out_dir();
    tokio::fs::create_dir_all(&out_dir).await?;
    let mut emitted = Vec::new();

    let glue_file = format!("{}.js", unit.name);
    let mut glue = descriptor.loader_glue.clone();

    let span = match descriptor.embedding {
        Some(span) => span,
        None => Embedding::raw(0, artifact.len() as u64),
    };
    let outcome = debugmap::merge(None, debug_map, &[span], unit.wants_source_map);
    if let Some(message) = outcome.diagnostic {
        warnings.push(UnitWarning {
            kind: FailureKind::DebugMap,
            message,
        });
    }

    if descriptor.is_inline() {
        if let Some(map) = outcome.map.filter(|_| unit.wants_source_map) {
            let map_file = format!("{glue_file}.map");
            let json = map.to_json(&descriptor.loader_glue);
            glue.push_str("//# sourceMappingURL=");
            glue.push_str(&map_file);
            glue.push('\n');
            emitted.push(write(&out_dir, &map_file, json.as_bytes()).await?);
        }
    } else {
        emitted.push(write(&out_dir, &descriptor.artifact_file, artifact).await?);
        if let Some(map) = outcome.map.filter(|_| unit.wants_source_map) {
            let map_file = format!("{}.map", descriptor.artifact_file);
            emitted.push(write(&out_dir, &map_file, map.to_artifact_json().as_bytes()).await?);
        }
    }

    emitted.insert(0, write(&out_dir, &glue_file, glue.as_bytes()).await?);
    Ok(emitted)
}

async fn write(dir: &Path, file: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(file);
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(path)
}
