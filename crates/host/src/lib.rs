//! The Plugin Framework & Lifecycle: activation order, configuration
//! snapshotting, reset-then-activate semantics, the teardown-exactly-once
//! guarantee, and the duplicate-activation guard.

mod context;
mod plugin;

pub use context::PluginContext;
pub use plugin::Plugin;

use pipeline::EventPipeline;
use wire::{AgentConfig, InstrumentationKind};

/// Owns plugin registration order and drives the session lifecycle.
///
/// One `PluginHost` is built per impression. A second `start()` on the same
/// host is the *fatal* error case from the error-handling design: refused
/// outright, reported once as `ClarityDuplicated`, so a page that somehow
/// double-activates the agent cannot double-discover the DOM and corrupt
/// node identity.
pub struct PluginHost {
    config: AgentConfig,
    plugins: Vec<Box<dyn Plugin>>,
    started: bool,
}

impl PluginHost {
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self { config, plugins: Vec::new(), started: false }
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Adds a plugin to the activation order. Only meaningful before
    /// `start`; plugins registered after a running host has started are not
    /// retroactively activated.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Resets every plugin, then activates them in registration order.
    ///
    /// # Errors
    /// Returns an error (without activating anything) if the host was
    /// already started. Also propagates the first plugin activation failure,
    /// leaving plugins registered after it un-activated.
    pub fn start(&mut self, pipeline: &EventPipeline) -> anyhow::Result<()> {
        if self.started {
            log::warn!("host: refusing duplicate start for an already-running impression");
            let _ = pipeline.instrument(InstrumentationKind::ClarityDuplicated, serde_json::json!({}));
            anyhow::bail!("plugin host already started for this impression");
        }

        let ctx = PluginContext::new(pipeline, &self.config);
        for plugin in &mut self.plugins {
            plugin.reset();
        }
        for plugin in &mut self.plugins {
            log::debug!("host: activating plugin {}", plugin.name());
            plugin.activate(&ctx)?;
        }
        self.started = true;
        Ok(())
    }

    /// Tears every plugin down, in registration order. A no-op if the host
    /// was never started or has already been torn down, so callers can call
    /// `stop` unconditionally on unload without double-tearing-down.
    ///
    /// # Errors
    /// Propagates the first plugin teardown failure; plugins after it still
    /// run (teardown should not leave later plugins leaking resources just
    /// because an earlier one misbehaved).
    pub fn stop(&mut self, pipeline: &EventPipeline) -> anyhow::Result<()> {
        if !self.started {
            return Ok(());
        }
        let ctx = PluginContext::new(pipeline, &self.config);
        let mut first_error = None;
        for plugin in &mut self.plugins {
            log::debug!("host: tearing down plugin {}", plugin.name());
            if let Err(error) = plugin.teardown(&ctx) {
                log::error!("host: plugin {} failed teardown: {error}", plugin.name());
                first_error.get_or_insert(error);
            }
        }
        self.started = false;
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
