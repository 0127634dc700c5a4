//! Rolldown plugin serving compiled units as virtual modules.

use std::borrow::Cow;
use std::sync::Arc;

use rolldown_common::{ModuleType, ResolvedExternal};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, Plugin, PluginContext,
};

use super::ModuleRegistry;

/// Prefix of the module ids this plugin owns.
pub const VIRTUAL_PREFIX: &str = "\0wasm:";

/// Serves `wasm:<unit>` and bare `<unit>` imports from a [`ModuleRegistry`].
///
/// The id carries the null-byte prefix so other plugins leave it alone.
/// Every importer resolves to the same id, so the bundler includes the glue
/// once and `init()` stays memoized across the graph.
#[derive(Debug, Clone)]
pub struct FobRustPlugin {
    registry: Arc<ModuleRegistry>,
}

impl FobRustPlugin {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Virtual id for an import specifier, if it names a known unit.
    pub fn resolve(&self, specifier: &str) -> Option<String> {
        self.registry
            .resolve_specifier(specifier)
            .map(|unit| format!("{VIRTUAL_PREFIX}{unit}"))
    }

    /// ES module source for a virtual id.
    pub fn source(&self, id: &str) -> Option<String> {
        let unit = id.strip_prefix(VIRTUAL_PREFIX)?;
        self.registry.get(unit).map(|d| d.esm_source.clone())
    }
}

impl Plugin for FobRustPlugin {
    fn name(&self) -> Cow<'static, str> {
        "fob-rust".into()
    }

    fn register_hook_usage(&self) -> rolldown_plugin::HookUsage {
        use rolldown_plugin::HookUsage;
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let resolved = self.resolve(args.specifier);

        async move {
            Ok(resolved.map(|id| HookResolveIdOutput {
                id: id.into(),
                external: Some(ResolvedExternal::Bool(false)),
                ..Default::default()
            }))
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let source = self.source(args.id);

        async move {
            Ok(source.map(|code| HookLoadOutput {
                code: code.into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOptions, describe, fixtures};
    use crate::unit::test_unit;
    use std::path::Path;

    fn plugin() -> FobRustPlugin {
        let registry = Arc::new(ModuleRegistry::new());
        registry.begin_build();
        let unit = test_unit("example", Path::new("/x"));
        registry.replace(
            describe(&unit, &fixtures::add_module(), &AdapterOptions::default()).unwrap(),
        );
        FobRustPlugin::new(registry)
    }

    #[test]
    fn test_plugin_name() {
        assert_eq!(plugin().name(), "fob-rust");
    }

    #[test]
    fn specifiers_resolve_to_one_virtual_id() {
        let plugin = plugin();
        assert_eq!(plugin.resolve("wasm:example").as_deref(), Some("\0wasm:example"));
        assert_eq!(plugin.resolve("example").as_deref(), Some("\0wasm:example"));
        assert_eq!(plugin.resolve("react"), None);
    }

    #[test]
    fn serves_esm_glue_for_virtual_ids() {
        let plugin = plugin();
        let source = plugin.source("\0wasm:example").unwrap();
        assert!(source.contains("export { init, wasmExports, __fob_w_add as add };"));
        assert!(plugin.source("example").is_none());
        assert!(plugin.source("\0wasm:missing").is_none());
    }
}
