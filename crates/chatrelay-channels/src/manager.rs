use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::channel::Channel;

/// Registry of the long-lived reply channels (e.g. the IM adapter).
///
/// Channels are stored by their [`Channel::name`]; asynchronous events name
/// the channel their reply must go out on and the worker resolves it here.
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    /// Create an empty manager with no registered channels.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    ///
    /// If a channel with the same name is already registered it is replaced.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registering channel adapter");
        self.channels.insert(name, channel);
    }

    /// Shared handle to the named channel, if it exists.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).cloned()
    }

    /// Registered channel names, sorted for deterministic output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
