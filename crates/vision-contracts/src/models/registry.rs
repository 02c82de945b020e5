use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariant {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub supports_high_res: bool,
}

impl ModelVariant {
    /// The high-capability variant: larger resolution tiers, search grounding,
    /// and a credential check before every action.
    pub fn is_high_capability(&self) -> bool {
        self.supports_high_res
    }

    /// Whether `alias` names this variant, by id or case-insensitive display
    /// name or its short form ("flash", "pro").
    pub fn matches(&self, alias: &str) -> bool {
        let needle = alias.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return false;
        }
        if self.id.eq_ignore_ascii_case(&needle) || self.display_name.to_ascii_lowercase() == needle
        {
            return true;
        }
        self.display_name
            .to_ascii_lowercase()
            .split_whitespace()
            .last()
            .map(|short| short == needle)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelVariant>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelVariant>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ModelVariant> {
        self.models.get(id)
    }

    pub fn find(&self, alias: &str) -> Option<&ModelVariant> {
        self.get(alias.trim())
            .or_else(|| self.models.values().find(|model| model.matches(alias)))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelVariant> {
        self.models.values()
    }

    pub fn default_model(&self) -> Option<&ModelVariant> {
        self.models.values().next()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn default_models() -> IndexMap<String, ModelVariant> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, display_name: &str, description: &str, supports_high_res: bool| {
        map.insert(
            id.to_string(),
            ModelVariant {
                id: id.to_string(),
                display_name: display_name.to_string(),
                description: description.to_string(),
                supports_high_res,
            },
        );
    };

    insert(
        "gemini-2.5-flash-image",
        "Gemini Flash",
        "Fast and reliable generation",
        false,
    );
    insert(
        "gemini-3-pro-image-preview",
        "Gemini Pro",
        "High-quality 4K & Real-time info",
        true,
    );

    map
}

#[cfg(test)]
mod tests {
    use super::ModelRegistry;

    #[test]
    fn default_catalog_lists_fast_variant_first() {
        let registry = ModelRegistry::default();
        let ids: Vec<&str> = registry.list().map(|model| model.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["gemini-2.5-flash-image", "gemini-3-pro-image-preview"]
        );
        let default = registry.default_model().unwrap();
        assert!(!default.is_high_capability());
    }

    #[test]
    fn find_accepts_ids_display_names_and_short_names() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.find("pro").map(|model| model.id.as_str()),
            Some("gemini-3-pro-image-preview")
        );
        assert_eq!(
            registry.find("Gemini Flash").map(|model| model.id.as_str()),
            Some("gemini-2.5-flash-image")
        );
        assert_eq!(
            registry
                .find("gemini-3-pro-image-preview")
                .map(|model| model.display_name.as_str()),
            Some("Gemini Pro")
        );
        assert!(registry.find("imagen").is_none());
        assert!(registry.find("  ").is_none());
    }
}
