//! The capability record every plugin implements: `{activate, reset,
//! teardown}`. No inheritance, no plugin base class — just a trait object
//! the host iterates over in registration order.

use crate::context::PluginContext;

/// One participant in the session: the Layout Tracker, or any of the
/// out-of-scope Pointer/Performance/Viewport/JS-error plugins this crate
/// only defines the event shapes for.
pub trait Plugin {
    /// Stable name used in logs and, where relevant, [`wire::Origin::Plugin`].
    fn name(&self) -> &'static str;

    /// Clears per-session fields. Always called before `activate`.
    fn reset(&mut self);

    /// Begins observing. Called once per activation, after `reset`.
    ///
    /// # Errors
    /// Returns an error for a programmer-error condition (not a session
    /// anomaly, which should be reported through `ctx.pipeline().instrument`
    /// instead of propagated here).
    fn activate(&mut self, ctx: &PluginContext<'_>) -> anyhow::Result<()>;

    /// Stops observing and releases anything `activate` registered.
    /// Guaranteed to run at most once per activation.
    ///
    /// # Errors
    /// Returns an error for a programmer-error condition.
    fn teardown(&mut self, ctx: &PluginContext<'_>) -> anyhow::Result<()>;
}
