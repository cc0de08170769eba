use std::collections::BTreeMap;

pub const MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VAL: &str = "runtime-conformance";
pub const COMPONENT_KEY: &str = "app.kubernetes.io/component";
pub const WORKLOAD_NAME_KEY: &str = "runtime-conformance/workload";

/// Collection of labels put on every object created by the conformance run.
pub struct DefaultLabels(BTreeMap<String, String>);

impl Default for DefaultLabels {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultLabels {
    pub fn new() -> Self {
        DefaultLabels(BTreeMap::from([(
            MANAGED_BY_KEY.to_string(),
            MANAGED_BY_VAL.to_string(),
        )]))
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.0
            .insert(COMPONENT_KEY.to_string(), component.to_string());
        self
    }

    pub fn with_workload(mut self, name: &str) -> Self {
        self.0
            .insert(WORKLOAD_NAME_KEY.to_string(), name.to_string());
        self
    }

    pub fn get(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}
