//! # Index
//!
//! Terms collected while laying out the body, grouped under the uppercase
//! first letter of the primary term. Terms starting with anything other
//! than a letter are grouped under `@`, which sorts first.

use std::collections::{BTreeMap, BTreeSet};

use super::{Converter, Look};
use crate::error::Result;
use crate::layout::{Align, FlowContext, ParagraphStyle, Side};

/// One entry and the pages it appears on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexTerm {
    pub name: String,
    pub pages: BTreeSet<usize>,
    /// Secondary terms under a primary one, tertiary under a secondary.
    pub subterms: Vec<IndexTerm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexCategory {
    pub letter: char,
    pub terms: Vec<IndexTerm>,
}

/// Sorted, deduplicated index terms.
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    categories: BTreeMap<char, Node>,
}

/// Children keyed case-insensitively, with the exact name as tie-breaker.
#[derive(Debug, Clone, Default)]
struct Node {
    pages: BTreeSet<usize>,
    children: BTreeMap<(String, String), Node>,
}

impl Node {
    fn child(&mut self, name: &str) -> &mut Node {
        self.children
            .entry((name.to_lowercase(), name.to_string()))
            .or_default()
    }

    fn terms(&self) -> Vec<IndexTerm> {
        self.children
            .iter()
            .map(|((_, name), node)| IndexTerm {
                name: name.clone(),
                pages: node.pages.clone(),
                subterms: node.terms(),
            })
            .collect()
    }
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: &[(Vec<String>, usize)]) -> Self {
        let mut catalog = Self::new();
        for (names, page) in terms {
            catalog.store(names, *page);
        }
        catalog
    }

    /// Record `page` for the deepest of up to three nested terms. Blank
    /// terms are ignored.
    pub fn store(&mut self, terms: &[String], page: usize) {
        let terms: Vec<&str> = terms
            .iter()
            .map(|t| t.trim())
            .take_while(|t| !t.is_empty())
            .take(3)
            .collect();
        let primary = match terms.first() {
            Some(p) => *p,
            None => return,
        };
        let mut node = self
            .categories
            .entry(category_of(primary))
            .or_default()
            .child(primary);
        for term in &terms[1..] {
            node = node.child(term);
        }
        node.pages.insert(page);
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Categories in order, `@` first.
    pub fn categories(&self) -> Vec<IndexCategory> {
        self.categories
            .iter()
            .map(|(&letter, node)| IndexCategory {
                letter,
                terms: node.terms(),
            })
            .collect()
    }
}

fn category_of(term: &str) -> char {
    match term.chars().next() {
        Some(c) if c.is_alphabetic() => c.to_uppercase().next().unwrap_or(c),
        _ => '@',
    }
}

impl Converter<'_> {
    /// The index title, then every category in a column box.
    pub(super) fn render_index(&self, ctx: &mut FlowContext) -> Result<()> {
        let terms = match self.known {
            Some(known) => known.registry.index_terms.clone(),
            None => ctx.registry().index_terms.clone(),
        };
        let catalog = IndexCatalog::from_terms(&terms);
        if catalog.is_empty() {
            self.warn(ctx, "index has no terms; skipping".to_string());
            return Ok(());
        }

        let theme = &self.theme.index;
        self.title(ctx, &theme.title)?;

        let look = self.look();
        let letter_look = Look {
            bold: true,
            ..look.clone()
        };
        ctx.column_box(theme.columns, theme.column_gap.pt(), |ctx| {
            for category in catalog.categories() {
                ctx.apply_margin(look.size, Side::Top);
                let runs = [self.text_run(category.letter.to_string(), &letter_look)];
                ctx.typeset(&runs, &self.body_style())?;
                for term in &category.terms {
                    self.index_term(ctx, term, 0, &look)?;
                }
            }
            Ok(())
        })?;
        self.margin_after(ctx);
        Ok(())
    }

    fn index_term(&self, ctx: &mut FlowContext, term: &IndexTerm, depth: usize, look: &Look) -> Result<()> {
        let pages: Vec<String> = term.pages.iter().map(|&p| self.page_label(p)).collect();
        let text = if pages.is_empty() {
            term.name.clone()
        } else {
            format!("{}, {}", term.name, pages.join(", "))
        };
        let style = ParagraphStyle {
            line_height: self.theme.base.line_height,
            align: Align::Left,
        };
        let indent = depth as f64 * look.size;
        ctx.with_indent(indent, 0.0, |ctx| ctx.typeset(&[self.text_run(text, look)], &style).map(drop))?;
        for sub in &term.subterms {
            self.index_term(ctx, sub, depth + 1, look)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_categories_by_first_letter() {
        let catalog = IndexCatalog::from_terms(&[
            (terms(&["zebra"]), 3),
            (terms(&["Apple"]), 1),
            (terms(&["42 things"]), 2),
            (terms(&["avocado"]), 5),
        ]);
        let letters: Vec<char> = catalog.categories().iter().map(|c| c.letter).collect();
        assert_eq!(letters, vec!['@', 'A', 'Z']);
        let a: Vec<String> = catalog.categories()[1].terms.iter().map(|t| t.name.clone()).collect();
        assert_eq!(a, vec!["Apple", "avocado"]);
    }

    #[test]
    fn test_pages_are_deduplicated_and_sorted() {
        let mut catalog = IndexCatalog::new();
        catalog.store(&terms(&["Cats"]), 7);
        catalog.store(&terms(&["Cats"]), 2);
        catalog.store(&terms(&["Cats"]), 7);
        let cats = &catalog.categories()[0].terms[0];
        assert_eq!(cats.pages.iter().copied().collect::<Vec<_>>(), vec![2, 7]);
    }

    #[test]
    fn test_nested_terms() {
        let mut catalog = IndexCatalog::new();
        catalog.store(&terms(&["Cats", "Tabby", "Orange"]), 4);
        catalog.store(&terms(&["Cats", "Siamese"]), 1);
        catalog.store(&terms(&["Cats", "Tabby"]), 2);
        let cats = &catalog.categories()[0].terms[0];
        assert!(cats.pages.is_empty());
        let names: Vec<&str> = cats.subterms.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Siamese", "Tabby"]);
        let tabby = &cats.subterms[1];
        assert_eq!(tabby.pages.iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(tabby.subterms[0].name, "Orange");
    }

    #[test]
    fn test_blank_terms_are_ignored() {
        let mut catalog = IndexCatalog::new();
        catalog.store(&terms(&["  "]), 1);
        catalog.store(&[], 1);
        assert!(catalog.is_empty());
    }
}
