// src/features/object_oriented.rs

use super::{FeatureGroup, FeatureMap};
use crate::error::Result;
use crate::model::{Commit, Version};
use crate::syntax::{self, SyntaxTree};
use std::collections::HashSet;

pub const NAME: &str = "object-oriented";

/// Metric counts for a single type declaration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TypeMetrics {
    pub wmc: u64,
    pub cbo: u64,
    pub rfc: u64,
    pub lcom: u64,
    pub npm: u64,
    pub npv: u64,
}

impl TypeMetrics {
    fn add(&mut self, other: TypeMetrics) {
        self.wmc += other.wmc;
        self.cbo += other.cbo;
        self.rfc += other.rfc;
        self.lcom += other.lcom;
        self.npm += other.npm;
        self.npv += other.npv;
    }

    fn into_features(self) -> FeatureMap {
        [
            ("WMC", self.wmc),
            ("CBO", self.cbo),
            ("RFC", self.rfc),
            ("LCOM", self.lcom),
            ("NPM", self.npm),
            ("NPV", self.npv),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v as f64))
        .collect()
    }
}

/// Decides whether a method counts towards LCOM.
///
/// `foreign_accesses` are the field accesses of the method that do NOT hit
/// one of the type's own fields. The method counts when that list is
/// non-empty. The conventional reading (count methods that touch none of
/// their own fields) would flip this test.
pub fn counts_towards_lcom(foreign_accesses: &[String]) -> bool {
    !foreign_accesses.is_empty()
}

/// Chidamber-Kemerer style design metrics, summed over every type in a file
pub struct ObjectOrientedFeatureGroup;

impl ObjectOrientedFeatureGroup {
    pub fn type_metrics(tree: &SyntaxTree, type_decl: tree_sitter::Node<'_>) -> TypeMetrics {
        let fields = tree.fields(type_decl);
        let own_fields: HashSet<String> = fields.iter().flat_map(|f| f.names.clone()).collect();
        let npv = fields.iter().filter(|f| f.public).count() as u64;

        let methods = tree.methods(type_decl);
        let own_methods: HashSet<String> = methods.iter().map(|m| tree.name(*m)).collect();

        let mut external_calls = 0u64;
        let mut lcom = 0u64;
        let mut npm = 0u64;
        for method in &methods {
            external_calls += tree
                .invoked_names(*method)
                .iter()
                .filter(|name| !own_methods.contains(*name))
                .count() as u64;

            let foreign_accesses: Vec<String> = tree
                .accessed_field_names(*method)
                .into_iter()
                .filter(|name| !own_fields.contains(name))
                .collect();
            if counts_towards_lcom(&foreign_accesses) {
                lcom += 1;
            }

            if syntax::is_public(*method) {
                npm += 1;
            }
        }

        let wmc = methods.len() as u64;
        TypeMetrics {
            wmc,
            cbo: external_calls,
            rfc: external_calls + wmc,
            lcom,
            npm,
            npv,
        }
    }
}

impl FeatureGroup for ObjectOrientedFeatureGroup {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract(
        &self,
        _commits: Option<&[Commit]>,
        _version: &Version,
        tree: &SyntaxTree,
    ) -> Result<FeatureMap> {
        let mut file = TypeMetrics::default();
        for type_decl in tree.type_declarations()? {
            file.add(Self::type_metrics(tree, type_decl));
        }
        Ok(file.into_features())
    }
}
