use serde::Deserialize;

/// The interpreter recurses on the native stack, so the isolate thread gets more than
/// the platform default.
const DEFAULT_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Engine settings. Every field has a default, so a partial document deserializes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the isolate thread.
    pub thread_name: String,
    /// Stack size of the isolate thread, in bytes.
    pub stack_size: usize,
    /// Maximum script call depth. `None` keeps the engine's default.
    pub recursion_limit: Option<usize>,
    /// Maximum iterations of a single loop. `None` keeps the engine's default.
    pub loop_iteration_limit: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            thread_name: "hostjs-isolate".into(),
            stack_size: DEFAULT_STACK_SIZE,
            recursion_limit: None,
            loop_iteration_limit: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_document() {
        let config: EngineConfig = serde_json::from_str(r#"{"loop_iteration_limit": 1000}"#).unwrap();
        assert_eq!(config.loop_iteration_limit, Some(1000));
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.thread_name, "hostjs-isolate");
        assert_eq!(config.recursion_limit, None);
    }

    #[test]
    fn empty_document_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
