use std::collections::HashMap;

/// Bidirectional module name and namespace table.
///
/// Submodules are recorded under the namespace of their owning module.
#[derive(Debug, Clone, Default)]
pub struct ModuleAndNamespaceResolver {
    module_to_namespace: HashMap<String, String>,
    namespace_to_module: HashMap<String, String>,
}

impl ModuleAndNamespaceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_module_mapping(&mut self, module: impl Into<String>, namespace: impl Into<String>) {
        self.module_to_namespace.insert(module.into(), namespace.into());
    }

    pub fn record_namespace_mapping(&mut self, namespace: impl Into<String>, module: impl Into<String>) {
        self.namespace_to_module.insert(namespace.into(), module.into());
    }

    pub fn namespace_for_module(&self, module: &str) -> Option<&str> {
        self.module_to_namespace.get(module).map(String::as_str)
    }

    pub fn module_for_namespace(&self, namespace: &str) -> Option<&str> {
        self.namespace_to_module.get(namespace).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_directions() {
        let mut resolver = ModuleAndNamespaceResolver::new();
        resolver.record_module_mapping("acme", "urn:acme");
        resolver.record_namespace_mapping("urn:acme", "acme");
        resolver.record_module_mapping("acme-sub", "urn:acme");
        assert_eq!(resolver.namespace_for_module("acme-sub"), Some("urn:acme"));
        assert_eq!(resolver.module_for_namespace("urn:acme"), Some("acme"));
        assert_eq!(resolver.module_for_namespace("urn:other"), None);
    }
}
