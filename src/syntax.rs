// src/syntax.rs

use crate::error::{Error, Result};
use tree_sitter::{Node, Parser, Tree};

const TYPE_BODIES: [&str; 4] = [
    "class_body",
    "interface_body",
    "enum_body_declarations",
    "annotation_type_body",
];

/// A parsed Java compilation unit together with the bytes it was parsed from.
///
/// Extractors only see type declarations, their members and a generic node walk.
pub struct SyntaxTree {
    tree: Tree,
    source: Vec<u8>,
}

/// A field declaration statement; one statement may declare several names
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub names: Vec<String>,
    pub public: bool,
}

pub fn parse(source: Vec<u8>) -> Result<SyntaxTree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| Error::Parse(e.to_string()))?;

    let tree = parser
        .parse(&source, None)
        .ok_or_else(|| Error::Parse("parser returned no tree".to_string()))?;
    if tree.root_node().has_error() {
        return Err(Error::Parse("source contains syntax errors".to_string()));
    }

    Ok(SyntaxTree { tree, source })
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Top-level class and interface declarations.
    ///
    /// Any other top-level type (enum, record, annotation) cannot be read as a
    /// class declaration and is reported as a `TreeShape` error.
    pub fn type_declarations(&self) -> Result<Vec<Node<'_>>> {
        let root = self.root();
        let mut types = Vec::new();
        for child in root.named_children(&mut root.walk()) {
            match child.kind() {
                "class_declaration" | "interface_declaration" => types.push(child),
                "enum_declaration" | "record_declaration" | "annotation_type_declaration" => {
                    return Err(Error::TreeShape(format!(
                        "{} at line {} is not a class declaration",
                        child.kind(),
                        child.start_position().row + 1
                    )));
                }
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn fields(&self, type_decl: Node<'_>) -> Vec<FieldDecl> {
        members(type_decl)
            .into_iter()
            .filter(|m| matches!(m.kind(), "field_declaration" | "constant_declaration"))
            .map(|field| FieldDecl {
                names: field
                    .children_by_field_name("declarator", &mut field.walk())
                    .filter_map(|d| d.child_by_field_name("name"))
                    .map(|n| self.text(n).to_string())
                    .collect(),
                public: is_public(field),
            })
            .collect()
    }

    /// Methods and constructors declared directly in the type body
    pub fn methods<'t>(&self, type_decl: Node<'t>) -> Vec<Node<'t>> {
        members(type_decl)
            .into_iter()
            .filter(|m| matches!(m.kind(), "method_declaration" | "constructor_declaration"))
            .collect()
    }

    pub fn name(&self, decl: Node<'_>) -> String {
        decl.child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default()
    }

    /// Names of every method invoked inside `node`, duplicates kept
    pub fn invoked_names(&self, node: Node<'_>) -> Vec<String> {
        descendants(node)
            .into_iter()
            .filter(|n| n.kind() == "method_invocation")
            .filter_map(|n| n.child_by_field_name("name"))
            .map(|n| self.text(n).to_string())
            .collect()
    }

    /// Names of every `expr.field` access inside `node`, duplicates kept.
    ///
    /// Qualified names such as `System.out` or `a.b.c` are not field accesses.
    pub fn accessed_field_names(&self, node: Node<'_>) -> Vec<String> {
        descendants(node)
            .into_iter()
            .filter(|n| n.kind() == "field_access" && !is_qualified_name(*n))
            .filter_map(|n| n.child_by_field_name("field"))
            .map(|n| self.text(n).to_string())
            .collect()
    }
}

/// The `modifiers` child carries the `public` keyword
pub fn is_public(decl: Node<'_>) -> bool {
    decl.children(&mut decl.walk())
        .filter(|c| c.kind() == "modifiers")
        .any(|modifiers| {
            modifiers
                .children(&mut modifiers.walk())
                .any(|m| m.kind() == "public")
        })
}

/// A `field_access` whose object chain bottoms out in a bare identifier
fn is_qualified_name(access: Node<'_>) -> bool {
    match access.child_by_field_name("object") {
        Some(object) if object.kind() == "identifier" => true,
        Some(object) if object.kind() == "field_access" => is_qualified_name(object),
        _ => false,
    }
}

pub fn is_type_body(node: Node<'_>) -> bool {
    TYPE_BODIES.contains(&node.kind())
}

/// Named, non-comment children of a type's body in source order
pub fn members(type_decl: Node<'_>) -> Vec<Node<'_>> {
    let Some(body) = type_decl.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

/// Named, non-comment nodes below `node` in pre-order, `node` excluded
pub fn descendants(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    collect_descendants(node, &mut out);
    out
}

fn collect_descendants<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    for child in node.named_children(&mut node.walk()) {
        if child.is_extra() {
            continue;
        }
        out.push(child);
        collect_descendants(child, out);
    }
}
