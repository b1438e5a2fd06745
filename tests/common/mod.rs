// Shared helpers for integration tests

use proptypes::builtin;
use proptypes::plugin::PropertyPlugin;
use proptypes::render::{NoopRenderer, PropertyRenderer};
use proptypes::store_io::{DirectoryContext, FilePersistence};
use std::sync::Arc;
use tempfile::TempDir;

/// Build a plugin core backed by a settings file in an isolated temp
/// directory, with every built-in type registered against a no-op
/// renderer.
pub fn temp_plugin() -> (TempDir, PropertyPlugin) {
    let temp = TempDir::new().unwrap();
    let plugin = plugin_in(&temp);
    (temp, plugin)
}

/// Build (or rebuild) a plugin core over an existing temp directory,
/// simulating a host restart against the same settings file.
pub fn plugin_in(temp: &TempDir) -> PropertyPlugin {
    let ctx = DirectoryContext::for_testing(temp.path());
    let persistence = Arc::new(FilePersistence::in_context(&ctx));
    let plugin = PropertyPlugin::new(persistence).unwrap();
    builtin::register_builtins(plugin.registry(), |_| {
        Some(Box::new(NoopRenderer) as Box<dyn PropertyRenderer>)
    });
    plugin
}

/// Path of the settings file inside a temp directory
pub fn settings_path(temp: &TempDir) -> std::path::PathBuf {
    DirectoryContext::for_testing(temp.path()).settings_path()
}
