// src/registry.rs

use crate::error::{Error, Result};
use crate::features::churn::{self, ChurnFeatureGroup};
use crate::features::object_oriented::{self, ObjectOrientedFeatureGroup};
use crate::features::FeatureGroup;
use tracing::{info, warn};

pub type Constructor = fn() -> Result<Box<dyn FeatureGroup>>;

/// Name -> constructor table of every metric extractor the binary ships
pub struct Registry {
    entries: Vec<(&'static str, Constructor)>,
}

fn object_oriented() -> Result<Box<dyn FeatureGroup>> {
    Ok(Box::new(ObjectOrientedFeatureGroup))
}

fn churn() -> Result<Box<dyn FeatureGroup>> {
    Ok(Box::new(ChurnFeatureGroup))
}

impl Registry {
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                (object_oriented::NAME, object_oriented as Constructor),
                (churn::NAME, churn as Constructor),
            ],
        }
    }

    #[cfg(test)]
    pub fn register(mut self, name: &'static str, constructor: Constructor) -> Self {
        self.entries.push((name, constructor));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn instantiate(&self, name: &str) -> Result<Box<dyn FeatureGroup>> {
        let (_, constructor) = self
            .entries
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| Error::PluginResolution {
                name: name.to_string(),
                reason: "no such feature group".to_string(),
            })?;
        constructor().map_err(|e| Error::PluginResolution {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Instantiates the named groups in order; unresolvable names are logged and skipped
    pub fn resolve(&self, names: &[String]) -> Vec<Box<dyn FeatureGroup>> {
        let mut groups = Vec::new();
        for name in names {
            match self.instantiate(name) {
                Ok(group) => {
                    info!(extractor = %name, "instantiated feature group");
                    groups.push(group);
                }
                Err(e) => warn!(extractor = %name, error = %e, "skipping feature group"),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> Result<Box<dyn FeatureGroup>> {
        Err(Error::Config("missing model file".to_string()))
    }

    #[test]
    fn resolves_only_requested_groups() {
        let registry = Registry::builtin();
        let groups = registry.resolve(&["churn".to_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), "churn");
    }

    #[test]
    fn unknown_and_broken_groups_are_skipped() {
        let registry = Registry::builtin().register("broken", broken);
        let names = ["nope", "broken", "object-oriented"].map(String::from);
        let groups = registry.resolve(&names);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), "object-oriented");

        assert!(matches!(
            registry.instantiate("broken"),
            Err(Error::PluginResolution { .. })
        ));
    }
}
