//! Loader glue generation.
//!
//! The glue is a small JavaScript module exposing a memoized `init()`, a
//! `wasmExports()` accessor and one wrapper per exported function. Every
//! import site shares the same module instance, so `init()` instantiates the
//! artifact at most once.
//!
//! Wrappers are declared under a `__fob_w_` prefix and exported under the
//! artifact's name, so an export such as `fetch` or `Buffer` never shadows
//! the global the loader itself calls.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fob_config::{LoaderMode, ModuleFormat, is_reserved_word};

use super::inspect::ModuleInterface;
use crate::debugmap::Embedding;

/// Names the glue itself exports; artifact exports never shadow them.
const GLUE_NAMES: &[&str] = &["init", "wasmExports", "default"];

/// Initializers run once, right after instantiation, in this order of preference.
const INITIALIZERS: &[&str] = &["__wbindgen_start", "_initialize"];

/// Prefix of the module-scope binding behind each exported wrapper.
const WRAPPER_PREFIX: &str = "__fob_w_";

/// Everything needed to render the glue for one unit.
#[derive(Debug, Clone, Copy)]
pub struct GlueRequest<'a> {
    pub unit_name: &'a str,
    pub interface: &'a ModuleInterface,
    pub format: ModuleFormat,
    pub loader: LoaderMode,
    pub server_path: Option<&'a str>,
    pub global_name: Option<&'a str>,
    /// File name the artifact is emitted under, next to the glue.
    pub artifact_file: &'a str,
    /// Artifact bytes, embedded when `loader` is inline.
    pub artifact: &'a [u8],
}

/// Rendered glue plus where the artifact landed inside it, if embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glue {
    pub code: String,
    pub embedding: Option<Embedding>,
}

/// Function exports that get a named wrapper in the glue.
pub fn wrapped_exports(interface: &ModuleInterface) -> Vec<&str> {
    let mut names: Vec<&str> = interface
        .function_exports()
        .filter(|name| is_wrappable(name))
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

fn is_wrappable(name: &str) -> bool {
    is_js_identifier(name)
        && !is_reserved_word(name)
        && !GLUE_NAMES.contains(&name)
        && !INITIALIZERS.contains(&name)
        && !name.starts_with("__fob_")
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Default IIFE global for a unit: its name with hyphens replaced, and a
/// trailing underscore when that would be a reserved word.
pub fn default_global_name(unit_name: &str) -> String {
    let mut global = unit_name.replace('-', "_");
    if is_reserved_word(&global) {
        global.push('_');
    }
    global
}

fn js_string(value: &str) -> String {
    // serde_json string escaping is valid JavaScript
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Render the glue module.
pub fn render(request: &GlueRequest<'_>) -> Glue {
    let wrapped = wrapped_exports(request.interface);
    let initializer = INITIALIZERS
        .iter()
        .find(|name| request.interface.exports_function(name));

    let mut code = String::new();
    let indent = match request.format {
        ModuleFormat::Iife => {
            let global = request
                .global_name
                .map(str::to_string)
                .unwrap_or_else(|| default_global_name(request.unit_name));
            let _ = writeln!(code, "var {global} = (function () {{");
            code.push_str("  \"use strict\";\n");
            "  "
        }
        ModuleFormat::Cjs => {
            code.push_str("\"use strict\";\n");
            ""
        }
        ModuleFormat::Esm => "",
    };

    let embedding = write_loader(&mut code, indent, request);

    let unit = js_string(request.unit_name);
    let _ = writeln!(code, "{indent}let __fob_instance;");
    let _ = writeln!(code, "{indent}let __fob_pending;");
    let _ = writeln!(code, "{indent}function init(imports = {{}}) {{");
    let _ = writeln!(code, "{indent}  if (!__fob_pending) {{");
    let _ = writeln!(code, "{indent}    __fob_pending = (async () => {{");
    let _ = writeln!(code, "{indent}      const bytes = await __fob_load();");
    let _ = writeln!(
        code,
        "{indent}      const {{ instance }} = await WebAssembly.instantiate(bytes, imports);"
    );
    let _ = writeln!(code, "{indent}      __fob_instance = instance;");
    if let Some(start) = initializer {
        let _ = writeln!(code, "{indent}      instance.exports.{start}();");
    }
    let _ = writeln!(code, "{indent}      return instance.exports;");
    let _ = writeln!(code, "{indent}    }})();");
    let _ = writeln!(
        code,
        "{indent}    __fob_pending.catch(() => {{ __fob_pending = undefined; }});"
    );
    let _ = writeln!(code, "{indent}  }}");
    let _ = writeln!(code, "{indent}  return __fob_pending;");
    let _ = writeln!(code, "{indent}}}");
    let _ = writeln!(code, "{indent}function wasmExports() {{");
    let _ = writeln!(code, "{indent}  if (!__fob_instance) {{");
    let _ = writeln!(
        code,
        "{indent}    throw new Error(\"wasm unit \" + {unit} + \" used before init() resolved\");"
    );
    let _ = writeln!(code, "{indent}  }}");
    let _ = writeln!(code, "{indent}  return __fob_instance.exports;");
    let _ = writeln!(code, "{indent}}}");
    for name in &wrapped {
        let _ = writeln!(
            code,
            "{indent}function {WRAPPER_PREFIX}{name}(...args) {{ return wasmExports().{name}(...args); }}"
        );
    }

    let mut exported = vec!["init".to_string(), "wasmExports".to_string()];
    match request.format {
        ModuleFormat::Esm => {
            exported.extend(
                wrapped
                    .iter()
                    .map(|name| format!("{WRAPPER_PREFIX}{name} as {name}")),
            );
            let _ = writeln!(code, "export {{ {} }};", exported.join(", "));
            code.push_str("export default init;\n");
        }
        ModuleFormat::Cjs | ModuleFormat::Iife => {
            exported.extend(
                wrapped
                    .iter()
                    .map(|name| format!("{name}: {WRAPPER_PREFIX}{name}")),
            );
            let list = exported.join(", ");
            if request.format == ModuleFormat::Cjs {
                let _ = writeln!(code, "module.exports = {{ {list}, default: init }};");
            } else {
                let _ = writeln!(code, "  return {{ {list}, default: init }};");
                code.push_str("})();\n");
            }
        }
    }

    Glue { code, embedding }
}

/// Emit `__fob_load`, returning the embedding span for inline artifacts.
fn write_loader(code: &mut String, indent: &str, request: &GlueRequest<'_>) -> Option<Embedding> {
    let location = match request.server_path {
        Some(base) => js_string(&format!("{base}{}", request.artifact_file)),
        None => js_string(request.artifact_file),
    };

    match request.loader {
        LoaderMode::Inline => {
            let _ = write!(code, "{indent}const __fob_wasm = \"");
            let start = code.len() as u64;
            STANDARD.encode_string(request.artifact, code);
            code.push_str("\";\n");
            let _ = writeln!(code, "{indent}async function __fob_load() {{");
            let _ = writeln!(code, "{indent}  if (typeof Buffer !== \"undefined\") {{");
            let _ = writeln!(code, "{indent}    return Buffer.from(__fob_wasm, \"base64\");");
            let _ = writeln!(code, "{indent}  }}");
            let _ = writeln!(
                code,
                "{indent}  return Uint8Array.from(atob(__fob_wasm), (c) => c.charCodeAt(0));"
            );
            let _ = writeln!(code, "{indent}}}");
            Some(Embedding::base64(start, request.artifact.len() as u64))
        }
        LoaderMode::Fetch => {
            let url = match (request.format, request.server_path) {
                (ModuleFormat::Esm, None) => format!("new URL({location}, import.meta.url)"),
                _ => location,
            };
            let _ = writeln!(code, "{indent}async function __fob_load() {{");
            let _ = writeln!(code, "{indent}  const response = await fetch({url});");
            let _ = writeln!(code, "{indent}  if (!response.ok) {{");
            let _ = writeln!(
                code,
                "{indent}    throw new Error(\"failed to fetch \" + response.url + \": \" + response.status);"
            );
            let _ = writeln!(code, "{indent}  }}");
            let _ = writeln!(code, "{indent}  return response.arrayBuffer();");
            let _ = writeln!(code, "{indent}}}");
            None
        }
        LoaderMode::Node => {
            let _ = writeln!(code, "{indent}async function __fob_load() {{");
            match (request.format, request.server_path) {
                (ModuleFormat::Esm, None) => {
                    let _ = writeln!(
                        code,
                        "{indent}  const {{ readFile }} = await import(\"node:fs/promises\");"
                    );
                    let _ = writeln!(
                        code,
                        "{indent}  return readFile(new URL({location}, import.meta.url));"
                    );
                }
                (ModuleFormat::Cjs, None) => {
                    let _ = writeln!(
                        code,
                        "{indent}  return require(\"node:fs\").promises.readFile(require(\"node:path\").join(__dirname, {location}));"
                    );
                }
                _ => {
                    let _ = writeln!(
                        code,
                        "{indent}  const {{ readFile }} = await import(\"node:fs/promises\");"
                    );
                    let _ = writeln!(code, "{indent}  return readFile({location});");
                }
            }
            let _ = writeln!(code, "{indent}}}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::inspect::{ExportItem, ItemKind};

    fn interface(names: &[(&str, ItemKind)]) -> ModuleInterface {
        ModuleInterface {
            exports: names
                .iter()
                .map(|(name, kind)| ExportItem {
                    name: name.to_string(),
                    kind: *kind,
                })
                .collect(),
            imports: vec![],
            has_start: false,
        }
    }

    fn request<'a>(interface: &'a ModuleInterface, artifact: &'a [u8]) -> GlueRequest<'a> {
        GlueRequest {
            unit_name: "example",
            interface,
            format: ModuleFormat::Esm,
            loader: LoaderMode::Fetch,
            server_path: None,
            global_name: None,
            artifact_file: "example.wasm",
            artifact,
        }
    }

    #[test]
    fn wraps_only_identifier_function_exports() {
        let iface = interface(&[
            ("add", ItemKind::Function),
            ("memory", ItemKind::Memory),
            ("not-an-ident", ItemKind::Function),
            ("delete", ItemKind::Function),
            ("init", ItemKind::Function),
            ("__wbindgen_start", ItemKind::Function),
        ]);
        assert_eq!(wrapped_exports(&iface), vec!["add"]);
    }

    #[test]
    fn esm_fetch_glue_is_memoized() {
        let iface = interface(&[("add", ItemKind::Function)]);
        let glue = render(&request(&iface, b""));

        assert!(glue.embedding.is_none());
        assert!(glue.code.contains("new URL(\"example.wasm\", import.meta.url)"));
        assert!(glue.code.contains("if (!__fob_pending)"));
        assert!(glue.code.contains("function __fob_w_add(...args)"));
        assert!(glue.code.contains("export { init, wasmExports, __fob_w_add as add };"));
        assert!(glue.code.contains("export default init;"));
    }

    #[test]
    fn server_path_prefixes_the_artifact_url() {
        let iface = interface(&[]);
        let mut req = request(&iface, b"");
        req.server_path = Some("/static/wasm/");
        let glue = render(&req);
        assert!(glue.code.contains("fetch(\"/static/wasm/example.wasm\")"));
    }

    #[test]
    fn initializer_runs_inside_init() {
        let iface = interface(&[("__wbindgen_start", ItemKind::Function)]);
        let glue = render(&request(&iface, b""));
        assert!(glue.code.contains("instance.exports.__wbindgen_start();"));
        assert!(!glue.code.contains("_initialize"));
    }

    #[test]
    fn inline_embedding_points_at_base64_payload() {
        let iface = interface(&[]);
        let artifact = b"\0asm\x01\0\0\0";
        let mut req = request(&iface, artifact);
        req.loader = LoaderMode::Inline;
        let glue = render(&req);

        let span = glue.embedding.unwrap();
        let start = span.bundle_start as usize;
        let end = start + span.bundle_len() as usize;
        assert_eq!(&glue.code[start..end], STANDARD.encode(artifact));
        assert_eq!(span.len, artifact.len() as u64);
    }

    #[test]
    fn iife_assigns_global() {
        let iface = interface(&[("add", ItemKind::Function)]);
        let mut req = request(&iface, b"");
        req.unit_name = "my-lib";
        req.format = ModuleFormat::Iife;
        let glue = render(&req);
        assert!(glue.code.starts_with("var my_lib = (function () {"));
        assert!(
            glue.code
                .contains("return { init, wasmExports, add: __fob_w_add, default: init };")
        );
        assert!(!glue.code.contains("import.meta"));
    }

    #[test]
    fn exports_named_after_loader_globals_do_not_shadow_them() {
        let iface = interface(&[
            ("fetch", ItemKind::Function),
            ("Buffer", ItemKind::Function),
        ]);

        let glue = render(&request(&iface, b""));
        assert!(!glue.code.contains("function fetch"));
        assert!(!glue.code.contains("function Buffer"));
        assert!(glue.code.contains("const response = await fetch("));
        assert!(
            glue.code
                .contains("function __fob_w_fetch(...args) { return wasmExports().fetch(...args); }")
        );
        assert!(glue.code.contains(
            "export { init, wasmExports, __fob_w_Buffer as Buffer, __fob_w_fetch as fetch };"
        ));

        let artifact = b"\0asm\x01\0\0\0";
        let mut req = request(&iface, artifact);
        req.format = ModuleFormat::Cjs;
        req.loader = LoaderMode::Inline;
        let glue = render(&req);
        assert!(!glue.code.contains("function Buffer"));
        assert!(glue.code.contains("return Buffer.from(__fob_wasm, \"base64\");"));
        assert!(glue.code.contains(
            "module.exports = { init, wasmExports, Buffer: __fob_w_Buffer, fetch: __fob_w_fetch, default: init };"
        ));
    }

    #[test]
    fn reserved_unit_name_gets_a_usable_global() {
        assert_eq!(default_global_name("class"), "class_");
        assert_eq!(default_global_name("my-lib"), "my_lib");

        let iface = interface(&[]);
        let mut req = request(&iface, b"");
        req.unit_name = "delete";
        req.format = ModuleFormat::Iife;
        let glue = render(&req);
        assert!(glue.code.starts_with("var delete_ = (function () {"));
    }

    #[test]
    fn cjs_node_reads_next_to_module() {
        let iface = interface(&[]);
        let mut req = request(&iface, b"");
        req.format = ModuleFormat::Cjs;
        req.loader = LoaderMode::Node;
        let glue = render(&req);
        assert!(glue.code.contains("join(__dirname, \"example.wasm\")"));
        assert!(glue.code.contains("module.exports = { init, wasmExports, default: init };"));
    }
}
