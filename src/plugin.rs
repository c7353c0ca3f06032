//! Plugin host boundary
//!
//! Traffic on the plugin-extension channel is forwarded here verbatim.
//! It never touches the screen-update pipeline: no highlight state is
//! read or written and no UI actions are emitted on its behalf.

use rmpv::Value;
use tracing::debug;

/// External collaborator receiving plugin-channel calls.
pub trait PluginHost {
    /// Handle one forwarded call. `method` is the plugin-facing method
    /// name stripped from the payload; `args` are the remaining fields.
    fn call(&mut self, method: &str, args: Vec<Value>);
}

/// Discards all plugin traffic. Useful for headless operation.
#[derive(Debug, Default)]
pub struct NullPluginHost;

impl PluginHost for NullPluginHost {
    fn call(&mut self, method: &str, _args: Vec<Value>) {
        debug!(method, "dropping plugin call (no plugin host attached)");
    }
}
