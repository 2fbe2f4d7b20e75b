//! What a plugin sees at activation and teardown: the pipeline it reports
//! through, and an immutable snapshot of the session's configuration.

use pipeline::EventPipeline;
use wire::AgentConfig;

/// Handed to every [`crate::Plugin`] callback. Plugins receive a config
/// snapshot once, at activation; runtime mutation of config is not
/// supported (per the Lifecycle & Plugin Host contract).
pub struct PluginContext<'a> {
    pipeline: &'a EventPipeline,
    config: &'a AgentConfig,
}

impl<'a> PluginContext<'a> {
    #[must_use]
    pub const fn new(pipeline: &'a EventPipeline, config: &'a AgentConfig) -> Self {
        Self { pipeline, config }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &'a EventPipeline {
        self.pipeline
    }

    #[must_use]
    pub const fn config(&self) -> &'a AgentConfig {
        self.config
    }
}
