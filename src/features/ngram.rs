// src/features/ngram.rs

use crate::model::{Level, NGramCounts, NGramTable};
use crate::syntax::{self, SyntaxTree};
use std::ops::RangeInclusive;

pub const SEPARATOR: &str = "-";

/// Node-kind n-grams at several structural granularities
#[derive(Debug, Clone)]
pub struct NGramExtractor {
    levels: Vec<Level>,
    orders: RangeInclusive<usize>,
}

impl NGramExtractor {
    pub fn new(levels: Vec<Level>, orders: RangeInclusive<usize>) -> Self {
        Self { levels, orders }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn orders(&self) -> RangeInclusive<usize> {
        self.orders.clone()
    }

    /// Builds the frequency table of one version.
    ///
    /// Every configured (level, order) pair gets a sub-table, empty when the
    /// file has nothing at that level.
    pub fn extract(&self, tree: &SyntaxTree) -> NGramTable {
        let mut table = NGramTable::default();
        for &level in &self.levels {
            let sequences = label_sequences(tree, level);
            for order in self.orders() {
                let counts = table.entry(level, order);
                for sequence in &sequences {
                    count_ngrams(sequence, order, counts);
                }
            }
        }
        table
    }
}

/// Slides a window of `order` labels over `labels`; shorter sequences add nothing
pub fn count_ngrams(labels: &[&str], order: usize, counts: &mut NGramCounts) {
    if order == 0 {
        return;
    }
    for window in labels.windows(order) {
        *counts.entry(window.join(SEPARATOR)).or_insert(0) += 1;
    }
}

/// Node-kind sequences visible at `level`, each in document order
pub fn label_sequences(tree: &SyntaxTree, level: Level) -> Vec<Vec<&'static str>> {
    let root = tree.root();
    match level {
        Level::Statement => syntax::descendants(root)
            .into_iter()
            .filter(|n| matches!(n.kind(), "method_declaration" | "constructor_declaration"))
            .filter_map(|m| m.child_by_field_name("body"))
            .map(|body| {
                body.named_children(&mut body.walk())
                    .filter(|s| !s.is_extra())
                    .map(|s| s.kind())
                    .collect()
            })
            .collect(),
        Level::Member => syntax::descendants(root)
            .into_iter()
            .filter(|n| syntax::is_type_body(*n))
            .map(|body| {
                body.named_children(&mut body.walk())
                    .filter(|m| !m.is_extra())
                    .map(|m| m.kind())
                    .collect()
            })
            .collect(),
        Level::Node => vec![syntax::descendants(root)
            .into_iter()
            .map(|n| n.kind())
            .collect()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn counts_of(labels: &[&str], order: usize) -> NGramCounts {
        let mut counts = NGramCounts::new();
        count_ngrams(labels, order, &mut counts);
        counts
    }

    #[test]
    fn bigrams_keep_order() {
        let counts = counts_of(&["A", "B", "A"], 2);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["A-B"], 1);
        assert_eq!(counts["B-A"], 1);
    }

    #[test]
    fn unigrams_count_repeats() {
        let counts = counts_of(&["A", "B", "A"], 1);
        assert_eq!(counts["A"], 2);
        assert_eq!(counts["B"], 1);
    }

    #[test]
    fn short_sequences_yield_nothing() {
        assert!(counts_of(&["A", "B"], 3).is_empty());
    }

    #[test]
    fn statement_level_walks_each_body() {
        let tree = parse(
            br#"
            class S {
                int f;
                void a() { int x = 1; x++; return; }
                S() { // comment
                    this.f = 2;
                }
            }
            "#
            .to_vec(),
        )
        .unwrap();

        let extractor = NGramExtractor::new(vec![Level::Statement, Level::Member], 1..=2);
        let table = extractor.extract(&tree);

        assert_eq!(table.count(Level::Statement, 1, "expression_statement"), 2);
        assert_eq!(table.count(Level::Statement, 1, "local_variable_declaration"), 1);
        assert_eq!(
            table.count(Level::Statement, 2, "local_variable_declaration-expression_statement"),
            1
        );
        assert_eq!(
            table.count(Level::Member, 2, "field_declaration-method_declaration"),
            1
        );
        assert_eq!(
            table.count(Level::Member, 2, "method_declaration-constructor_declaration"),
            1
        );
    }

    #[test]
    fn empty_levels_still_get_sub_tables() {
        let tree = parse(b"package p;".to_vec()).unwrap();
        let extractor = NGramExtractor::new(vec![Level::Statement], 1..=3);
        let table = extractor.extract(&tree);
        for order in 1..=3 {
            assert_eq!(table.counts(Level::Statement, order), Some(&NGramCounts::new()));
        }
    }

    #[test]
    fn node_level_covers_the_whole_file() {
        let tree = parse(b"class N { void m() { this.x = y; } }".to_vec()).unwrap();
        let extractor = NGramExtractor::new(vec![Level::Node], 1..=1);
        let table = extractor.extract(&tree);
        assert_eq!(table.count(Level::Node, 1, "class_declaration"), 1);
        assert_eq!(table.count(Level::Node, 1, "field_access"), 1);
        assert_eq!(table.count(Level::Node, 1, "this"), 1);
    }
}
