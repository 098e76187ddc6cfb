use std::collections::{BTreeMap, HashMap};

use asl_core::{Gradient, PatternTile};

/// Where patterns and gradients referenced by styles are kept.
pub trait ResourceRegistry {
    /// Adds a pattern under `uuid`. Returns `false` and keeps the existing
    /// one when the identifier is already taken.
    fn register_pattern(&mut self, uuid: &str, tile: PatternTile) -> bool;

    fn resolve_pattern(&self, uuid: &str) -> Option<&PatternTile>;

    /// Identifier of an already registered tile with the same pixels.
    fn find_pattern_by_content(&self, tile: &PatternTile) -> Option<&str>;

    fn register_gradient(&mut self, gradient: Gradient);
}

/// In-memory registry owned by one serializer.
#[derive(Debug, Clone, Default)]
pub struct LocalResources {
    patterns: BTreeMap<String, PatternTile>,
    by_content: HashMap<String, String>,
    gradients: Vec<Gradient>,
}

impl LocalResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&str, &PatternTile)> {
        self.patterns.iter().map(|(uuid, tile)| (uuid.as_str(), tile))
    }

    pub fn gradients(&self) -> &[Gradient] {
        &self.gradients
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl ResourceRegistry for LocalResources {
    fn register_pattern(&mut self, uuid: &str, tile: PatternTile) -> bool {
        if let Some(existing) = self.patterns.get(uuid) {
            log::warn!(
                "duplicated pattern {:?}: keeping {:?}, dropping {:?}",
                uuid,
                existing.name,
                tile.name
            );
            return false;
        }
        self.by_content
            .entry(tile.content_uuid())
            .or_insert_with(|| uuid.to_string());
        self.patterns.insert(uuid.to_string(), tile);
        true
    }

    fn resolve_pattern(&self, uuid: &str) -> Option<&PatternTile> {
        self.patterns.get(uuid)
    }

    fn find_pattern_by_content(&self, tile: &PatternTile) -> Option<&str> {
        self.by_content.get(&tile.content_uuid()).map(String::as_str)
    }

    fn register_gradient(&mut self, gradient: Gradient) {
        if !self.gradients.contains(&gradient) {
            self.gradients.push(gradient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut resources = LocalResources::new();
        assert!(resources.register_pattern("a", PatternTile::filled("red", 2, 2, [255, 0, 0, 255])));
        assert!(!resources.register_pattern("a", PatternTile::filled("blue", 2, 2, [0, 0, 255, 255])));
        assert_eq!(resources.resolve_pattern("a").map(|t| t.name.as_str()), Some("red"));
    }

    #[test]
    fn finds_patterns_by_content() {
        let mut resources = LocalResources::new();
        resources.register_pattern("a", PatternTile::filled("one", 2, 2, [1, 2, 3, 255]));
        let same_pixels = PatternTile::filled("one", 2, 2, [1, 2, 3, 255]);
        assert_eq!(resources.find_pattern_by_content(&same_pixels), Some("a"));
        let other = PatternTile::filled("one", 2, 2, [3, 2, 1, 255]);
        assert_eq!(resources.find_pattern_by_content(&other), None);
    }
}
