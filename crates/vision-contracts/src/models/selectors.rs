use super::registry::{ModelRegistry, ModelVariant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelVariant,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    pub fn select(&self, requested: Option<&str>) -> Result<ModelSelection, String> {
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.find(requested_value) {
                return Ok(ModelSelection {
                    model: model.clone(),
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' is not in the catalog; using default."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (None, None)
        };

        let Some(model) = self.registry.default_model().cloned() else {
            return Err("Model catalog is empty.".to_string());
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{ModelRegistry, ModelVariant};

    #[test]
    fn selector_returns_requested_model_by_alias() {
        let selection = ModelSelector::new(None).select(Some("pro")).unwrap();
        assert_eq!(selection.model.id, "gemini-3-pro-image-preview");
        assert_eq!(selection.requested.as_deref(), Some("pro"));
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn selector_falls_back_when_requested_model_unknown() {
        let selection = ModelSelector::new(None).select(Some("missing")).unwrap();
        assert_eq!(selection.model.id, "gemini-2.5-flash-image");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' is not in the catalog; using default.")
        );
    }

    #[test]
    fn selector_without_request_uses_default_silently() {
        let selection = ModelSelector::new(None).select(None).unwrap();
        assert_eq!(selection.model.display_name, "Gemini Flash");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn selector_errors_on_empty_catalog() {
        let registry = ModelRegistry::new(Some(IndexMap::<String, ModelVariant>::new()));
        let err = ModelSelector::new(Some(registry))
            .select(Some("pro"))
            .err()
            .unwrap_or_default();
        assert_eq!(err, "Model catalog is empty.");
    }
}
