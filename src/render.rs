//! Renderer contract for property widgets
//!
//! Widgets live outside this crate; the core only constructs a
//! `RenderContext` and hands it to the descriptor's renderer. It never
//! inspects widget internals.

use serde_json::Value;
use std::path::PathBuf;

/// Opaque handle to the host's rendering surface
///
/// The core treats the surface as a black box; widget implementations
/// downcast to the host's concrete container type.
pub trait RenderSurface {
    /// Support downcasting to the host's concrete surface type
    fn as_any(&mut self) -> &mut dyn std::any::Any;
}

/// Renders one property value into a host surface
pub trait PropertyRenderer: Send + Sync {
    /// Render `value` for the property named `property` into `surface`.
    ///
    /// `ctx` carries the change callback, the source document path, and
    /// cleanup registration for the view's teardown.
    fn render(
        &self,
        surface: &mut dyn RenderSurface,
        property: &str,
        value: &Value,
        ctx: &mut RenderContext,
    ) -> anyhow::Result<()>;
}

/// Context supplied by the core to every render call
pub struct RenderContext {
    on_change: Box<dyn Fn(Value) + Send + Sync>,
    /// Path of the document the rendered property belongs to
    pub source_path: PathBuf,
    cleanups: Vec<Box<dyn FnOnce() + Send>>,
}

impl RenderContext {
    /// Create a context for one render pass
    pub fn new(source_path: PathBuf, on_change: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self {
            on_change: Box::new(on_change),
            source_path,
            cleanups: Vec::new(),
        }
    }

    /// Report a new value chosen by the user in the widget
    pub fn notify_change(&self, new_value: Value) {
        (self.on_change)(new_value);
    }

    /// Register a callback to run when the view is torn down
    pub fn register_cleanup(&mut self, f: impl FnOnce() + Send + 'static) {
        self.cleanups.push(Box::new(f));
    }

    /// Run and clear all registered cleanups (view teardown)
    pub fn run_cleanups(&mut self) {
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("source_path", &self.source_path)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}

/// A renderer that draws nothing, for tests and headless hosts
pub struct NoopRenderer;

impl PropertyRenderer for NoopRenderer {
    fn render(
        &self,
        _surface: &mut dyn RenderSurface,
        _property: &str,
        _value: &Value,
        _ctx: &mut RenderContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A surface that holds nothing, for tests and headless hosts
#[derive(Default)]
pub struct NoopSurface;

impl RenderSurface for NoopSurface {
    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
