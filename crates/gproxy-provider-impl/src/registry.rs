use std::collections::HashMap;
use std::sync::Arc;

use gproxy_provider_core::{ChannelHandler, ChannelKind};

use crate::channels::{AnthropicChannelHandler, CodexChannelHandler, GeminiChannelHandler, OpenAiChannelHandler};

/// Holds one `Arc<dyn ChannelHandler>` per `ChannelKind`. Built once at
/// startup and shared read-only across every request task.
pub struct ChannelRegistry {
    handlers: HashMap<ChannelKind, Arc<dyn ChannelHandler>>,
}

impl ChannelRegistry {
    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

/// The four built-in dialects this crate knows how to talk to.
pub fn builtin_channel_registry() -> ChannelRegistry {
    let mut handlers: HashMap<ChannelKind, Arc<dyn ChannelHandler>> = HashMap::new();
    handlers.insert(ChannelKind::OpenAI, Arc::new(OpenAiChannelHandler));
    handlers.insert(ChannelKind::Codex, Arc::new(CodexChannelHandler));
    handlers.insert(ChannelKind::Gemini, Arc::new(GeminiChannelHandler));
    handlers.insert(ChannelKind::Anthropic, Arc::new(AnthropicChannelHandler));
    ChannelRegistry { handlers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_channel_kind_has_a_handler() {
        let registry = builtin_channel_registry();
        assert!(registry.get(ChannelKind::OpenAI).is_some());
        assert!(registry.get(ChannelKind::Codex).is_some());
        assert!(registry.get(ChannelKind::Gemini).is_some());
        assert!(registry.get(ChannelKind::Anthropic).is_some());
    }
}
