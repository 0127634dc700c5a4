use clap::ValueEnum;
use fob_config::{LoaderMode, ModuleFormat};

/// Module format of the emitted loader glue
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Format {
    /// ECMAScript modules (import/export syntax)
    #[value(name = "esm")]
    Esm,

    /// CommonJS modules (require/module.exports)
    #[value(name = "cjs")]
    Cjs,

    /// Immediately Invoked Function Expression
    ///
    /// Assigns the module's API to a global variable. Suitable for browser
    /// script tags.
    #[value(name = "iife")]
    Iife,
}

impl From<Format> for ModuleFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Esm => ModuleFormat::Esm,
            Format::Cjs => ModuleFormat::Cjs,
            Format::Iife => ModuleFormat::Iife,
        }
    }
}

/// How the loader glue obtains the artifact bytes
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Loader {
    /// Fetch the `.wasm` file next to the module (or below `server_path`)
    #[value(name = "fetch")]
    Fetch,

    /// Embed the artifact as base64 inside the module
    ///
    /// Produces a single file; no `.wasm` is written.
    #[value(name = "inline")]
    Inline,

    /// Read the `.wasm` file from disk under Node.js
    #[value(name = "node")]
    Node,
}

impl From<Loader> for LoaderMode {
    fn from(loader: Loader) -> Self {
        match loader {
            Loader::Fetch => LoaderMode::Fetch,
            Loader::Inline => LoaderMode::Inline,
            Loader::Node => LoaderMode::Node,
        }
    }
}
