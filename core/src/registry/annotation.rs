use serde::{Deserialize, Serialize};

/// A metadata annotation declared with `md:annotation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YangAnnotation {
    pub namespace: Option<String>,
    pub module: String,
    pub name: String,
}

/// Flat list of declared annotations.
#[derive(Debug, Clone, Default)]
pub struct AnnotationRegistry {
    annotations: Vec<YangAnnotation>,
}

impl AnnotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_annotation(&mut self, annotation: YangAnnotation) {
        self.annotations.push(annotation);
    }

    pub fn annotations(&self) -> &[YangAnnotation] {
        &self.annotations
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }
}
