//! Module adapter: exposes a compiled artifact as an importable module.
//!
//! An artifact is validated and inspected once, then described by a
//! [`ModuleDescriptor`] holding the generated loader glue. Descriptors are
//! memoized per unit per build in a [`ModuleRegistry`], which backs the
//! Rolldown [`FobRustPlugin`].

pub mod glue;
pub mod inspect;
mod plugin;
mod registry;

pub use inspect::{ExportItem, ImportItem, ItemKind, ModuleInterface, inspect};
pub use plugin::{FobRustPlugin, VIRTUAL_PREFIX};
pub use registry::ModuleRegistry;

use std::collections::BTreeSet;

use fob_config::{LoaderMode, ModuleFormat, RustBuildConfig};

use crate::debugmap::Embedding;
use crate::error::Result;
use crate::unit::CompilationUnit;
use glue::GlueRequest;

/// How glue loads artifacts at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterOptions {
    pub loader_mode: LoaderMode,
    pub server_path: Option<String>,
    pub global_name: Option<String>,
}

impl AdapterOptions {
    pub fn from_config(config: &RustBuildConfig) -> Self {
        Self {
            loader_mode: config.loader.mode,
            server_path: config.toolchain.server_path.clone(),
            global_name: config.output.global_name.clone(),
        }
    }
}

/// A unit as seen by the module graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub unit_name: String,
    /// Every name the artifact exports, whatever its kind.
    pub exported_symbols: BTreeSet<String>,
    /// Glue in the unit's configured output format.
    pub loader_glue: String,
    /// Glue as an ES module, served to the bundler.
    pub esm_source: String,
    /// Where the artifact sits inside `loader_glue` when inlined.
    pub embedding: Option<Embedding>,
    /// File name the artifact is emitted under in non-inline modes.
    pub artifact_file: String,
    pub interface: ModuleInterface,
}

impl ModuleDescriptor {
    pub fn is_inline(&self) -> bool {
        self.embedding.is_some()
    }
}

/// File name of a unit's emitted artifact.
pub fn artifact_file_name(unit_name: &str) -> String {
    format!("{unit_name}.wasm")
}

/// Validate `artifact` and generate the unit's loader glue.
///
/// Fails with [`Error::InstantiationError`](crate::Error::InstantiationError)
/// when the bytes are not a valid module.
pub fn describe(
    unit: &CompilationUnit,
    artifact: &[u8],
    options: &AdapterOptions,
) -> Result<ModuleDescriptor> {
    let interface = inspect(&unit.name, artifact)?;
    let artifact_file = artifact_file_name(&unit.name);

    let request = GlueRequest {
        unit_name: &unit.name,
        interface: &interface,
        format: unit.output_format,
        loader: options.loader_mode,
        server_path: options.server_path.as_deref(),
        global_name: options.global_name.as_deref(),
        artifact_file: &artifact_file,
        artifact,
    };
    let rendered = glue::render(&request);
    let esm_source = if unit.output_format == ModuleFormat::Esm {
        rendered.code.clone()
    } else {
        glue::render(&GlueRequest {
            format: ModuleFormat::Esm,
            ..request
        })
        .code
    };

    tracing::debug!(
        unit = %unit.name,
        exports = interface.exports.len(),
        imports = interface.imports.len(),
        loader = options.loader_mode.as_str(),
        "described module"
    );

    Ok(ModuleDescriptor {
        unit_name: unit.name.clone(),
        exported_symbols: interface.exports.iter().map(|e| e.name.clone()).collect(),
        loader_glue: rendered.code,
        esm_source,
        embedding: rendered.embedding,
        artifact_file,
        interface,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use wasm_encoder::{
        CodeSection, ExportKind, ExportSection, Function, FunctionSection, Instruction, Module,
        TypeSection, ValType,
    };

    /// A module exporting `add(i32, i32) -> i32`.
    pub fn add_module() -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        types.ty().function([ValType::I32, ValType::I32], [ValType::I32]);
        module.section(&types);

        let mut functions = FunctionSection::new();
        functions.function(0);
        module.section(&functions);

        let mut exports = ExportSection::new();
        exports.export("add", ExportKind::Func, 0);
        module.section(&exports);

        let mut code = CodeSection::new();
        let mut body = Function::new([]);
        body.instruction(&Instruction::LocalGet(0));
        body.instruction(&Instruction::LocalGet(1));
        body.instruction(&Instruction::I32Add);
        body.instruction(&Instruction::End);
        code.function(&body);
        module.section(&code);

        module.finish()
    }
}
