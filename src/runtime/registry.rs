use std::collections::BTreeMap;

use crate::agent::{Runtime, RuntimeError, RuntimeKind};

use super::claude::ClaudeRuntime;
use super::codex::CodexRuntime;
use super::gemini::GeminiRuntime;

/// Name-to-adapter lookup over the supported runtime kinds.
pub struct RuntimeRegistry {
    adapters: BTreeMap<RuntimeKind, Box<dyn Runtime>>,
}

impl RuntimeRegistry {
    /// Registry with every built-in adapter registered.
    pub fn with_known_kinds() -> Self {
        let mut adapters: BTreeMap<RuntimeKind, Box<dyn Runtime>> = BTreeMap::new();
        adapters.insert(RuntimeKind::Claude, Box::new(ClaudeRuntime::new()));
        adapters.insert(RuntimeKind::Codex, Box::new(CodexRuntime::new()));
        adapters.insert(RuntimeKind::Gemini, Box::new(GeminiRuntime::new()));
        Self { adapters }
    }

    pub fn list(&self) -> Vec<RuntimeKind> {
        self.adapters.keys().copied().collect()
    }

    pub fn get(&self, kind: RuntimeKind) -> Result<&dyn Runtime, RuntimeError> {
        self.adapters
            .get(&kind)
            .map(Box::as_ref)
            .ok_or(RuntimeError::KindNotFound)
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::with_known_kinds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_all_known_kinds() {
        let registry = RuntimeRegistry::with_known_kinds();
        assert_eq!(
            registry.list(),
            vec![RuntimeKind::Claude, RuntimeKind::Codex, RuntimeKind::Gemini]
        );
    }

    #[test]
    fn resolves_each_kind_to_its_adapter() {
        let registry = RuntimeRegistry::with_known_kinds();
        for kind in registry.list() {
            let adapter = registry.get(kind).expect("registered kind");
            assert_eq!(adapter.kind(), kind);
        }
    }
}
