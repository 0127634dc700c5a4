//! Structural validation and interface extraction for artifacts.

use serde::Serialize;
use wasmparser::{ExternalKind, Parser, Payload, TypeRef, Validator};

use crate::error::{Error, Result};

/// Kind of an exported or imported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Function,
    Table,
    Memory,
    Global,
    Tag,
}

impl From<ExternalKind> for ItemKind {
    fn from(kind: ExternalKind) -> Self {
        match kind {
            ExternalKind::Func => ItemKind::Function,
            ExternalKind::Table => ItemKind::Table,
            ExternalKind::Memory => ItemKind::Memory,
            ExternalKind::Global => ItemKind::Global,
            ExternalKind::Tag => ItemKind::Tag,
        }
    }
}

impl From<&TypeRef> for ItemKind {
    fn from(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Func(_) => ItemKind::Function,
            TypeRef::Table(_) => ItemKind::Table,
            TypeRef::Memory(_) => ItemKind::Memory,
            TypeRef::Global(_) => ItemKind::Global,
            TypeRef::Tag(_) => ItemKind::Tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportItem {
    pub name: String,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportItem {
    pub module: String,
    pub name: String,
    pub kind: ItemKind,
}

/// What a module exposes and requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleInterface {
    pub exports: Vec<ExportItem>,
    pub imports: Vec<ImportItem>,
    /// The module declares a start function, run by instantiation itself.
    pub has_start: bool,
}

impl ModuleInterface {
    pub fn function_exports(&self) -> impl Iterator<Item = &str> {
        self.exports
            .iter()
            .filter(|e| e.kind == ItemKind::Function)
            .map(|e| e.name.as_str())
    }

    pub fn exports_function(&self, name: &str) -> bool {
        self.function_exports().any(|n| n == name)
    }
}

/// Validate `bytes` and read the module's interface.
///
/// Invalid bytes are an [`Error::InstantiationError`] for `unit`.
pub fn inspect(unit: &str, bytes: &[u8]) -> Result<ModuleInterface> {
    let invalid = |reason: String| Error::InstantiationError {
        unit: unit.to_string(),
        reason,
    };

    Validator::new()
        .validate_all(bytes)
        .map_err(|e| invalid(e.to_string()))?;

    let mut interface = ModuleInterface::default();
    for payload in Parser::new(0).parse_all(bytes) {
        match payload.map_err(|e| invalid(e.to_string()))? {
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| invalid(e.to_string()))?;
                    interface.exports.push(ExportItem {
                        name: export.name.to_string(),
                        kind: export.kind.into(),
                    });
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(|e| invalid(e.to_string()))?;
                    interface.imports.push(ImportItem {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                        kind: (&import.ty).into(),
                    });
                }
            }
            Payload::StartSection { .. } => interface.has_start = true,
            _ => {}
        }
    }

    Ok(interface)
}
