//! `<style>` sheets: rule parsing, selector matching and specificity.
//!
//! Supported selectors are type, `*`, class, id and attribute tests
//! (`[a]`, `[a=v]`, `[a~=v]`, `[a|=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`),
//! joined by descendant or child combinators. Rules with anything else are
//! skipped.

use super::dom::Document;
use super::properties::parse_declarations;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct AttributeTest {
    key: String,
    operator: Option<String>,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    name: Option<String>,
    classes: Vec<String>,
    ids: Vec<String>,
    attributes: Vec<AttributeTest>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// A parsed selector, stored right to left: the first compound is the
/// subject and each following one is reached through its combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<(Compound, Option<Combinator>)>,
}

impl Selector {
    pub fn parse(text: &str) -> Option<Selector> {
        let mut compounds: Vec<(Option<Combinator>, Compound)> = Vec::new();
        let mut current = Compound::default();
        let mut current_empty = true;
        let mut pending: Option<Combinator> = None;
        let chars: Vec<char> = text.trim().chars().collect();
        let mut i = 0;

        let ident = |chars: &[char], mut i: usize| {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            (chars[start..i].iter().collect::<String>(), i)
        };

        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' | '\n' | '>' => {
                    if !current_empty {
                        compounds.push((pending.take(), std::mem::take(&mut current)));
                        current_empty = true;
                    }
                    if c == '>' {
                        if compounds.is_empty() {
                            return None;
                        }
                        pending = Some(Combinator::Child);
                    } else if pending.is_none() && !compounds.is_empty() {
                        pending = Some(Combinator::Descendant);
                    }
                    i += 1;
                }
                '*' => {
                    if !current_empty {
                        return None;
                    }
                    current_empty = false;
                    i += 1;
                }
                '.' | '#' => {
                    let (name, next) = ident(&chars, i + 1);
                    if name.is_empty() {
                        return None;
                    }
                    if c == '.' {
                        current.classes.push(name);
                    } else {
                        current.ids.push(name);
                    }
                    current_empty = false;
                    i = next;
                }
                '[' => {
                    let close = chars[i..].iter().position(|&ch| ch == ']')? + i;
                    let inner: String = chars[i + 1..close].iter().collect();
                    current.attributes.push(parse_attribute_test(&inner)?);
                    current_empty = false;
                    i = close + 1;
                }
                c if is_ident_char(c) => {
                    if !current_empty {
                        return None;
                    }
                    let (name, next) = ident(&chars, i);
                    current.name = Some(name);
                    current_empty = false;
                    i = next;
                }
                _ => return None,
            }
        }
        if current_empty {
            if pending.is_some() || compounds.is_empty() {
                return None;
            }
        } else {
            compounds.push((pending.take(), current));
        }

        // Reverse so the subject comes first; each compound keeps the
        // combinator that leads to the next (outer) one.
        let mut parts = Vec::with_capacity(compounds.len());
        let mut combinators: Vec<Option<Combinator>> = compounds.iter().map(|(c, _)| *c).collect();
        combinators.push(None);
        for (idx, (_, compound)) in compounds.into_iter().enumerate().rev() {
            parts.push((compound, combinators[idx]));
        }
        Some(Selector { parts })
    }

    /// (ids, classes + attributes, types).
    pub fn specificity(&self) -> (usize, usize, usize) {
        self.parts.iter().fold((0, 0, 0), |(a, b, c), (compound, _)| {
            (
                a + compound.ids.len(),
                b + compound.classes.len() + compound.attributes.len(),
                c + usize::from(compound.name.is_some()),
            )
        })
    }

    pub fn matches(&self, doc: &Document, node: usize) -> bool {
        self.match_from(doc, node, 0)
    }

    fn match_from(&self, doc: &Document, node: usize, part: usize) -> bool {
        let (compound, combinator) = &self.parts[part];
        if !compound_matches(doc, node, compound) {
            return false;
        }
        if part + 1 == self.parts.len() {
            return true;
        }
        let parent = doc.node(node).parent;
        match combinator {
            Some(Combinator::Child) => parent.map_or(false, |p| self.match_from(doc, p, part + 1)),
            _ => {
                let mut ancestor = parent;
                while let Some(a) = ancestor {
                    if self.match_from(doc, a, part + 1) {
                        return true;
                    }
                    ancestor = doc.node(a).parent;
                }
                false
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c as u32 >= 0xA0
}

fn parse_attribute_test(inner: &str) -> Option<AttributeTest> {
    let inner = inner.trim();
    let op_start = inner.find(|c: char| "=~|^$*".contains(c));
    let Some(op_start) = op_start else {
        if inner.is_empty() || !inner.chars().all(is_ident_char) {
            return None;
        }
        return Some(AttributeTest {
            key: inner.to_string(),
            operator: None,
            value: String::new(),
        });
    };
    let key = inner[..op_start].trim();
    let rest = &inner[op_start..];
    let op_len = rest.find('=')? + 1;
    let operator = &rest[..op_len];
    if !matches!(operator, "=" | "~=" | "|=" | "^=" | "$=" | "*=") || key.is_empty() {
        return None;
    }
    let raw = rest[op_len..].trim();
    let value = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(raw);
    Some(AttributeTest {
        key: key.to_string(),
        operator: Some(operator.to_string()),
        value: value.to_string(),
    })
}

fn compound_matches(doc: &Document, idx: usize, compound: &Compound) -> bool {
    let node = doc.node(idx);
    if let Some(name) = &compound.name {
        if &node.name != name {
            return false;
        }
    }
    if !compound.ids.iter().all(|id| node.attr("id") == Some(id.as_str())) {
        return false;
    }
    let classes: Vec<&str> = node.attr("class").map(|c| c.split_whitespace().collect()).unwrap_or_default();
    if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
        return false;
    }
    compound.attributes.iter().all(|test| {
        let Some(actual) = node.attr(&test.key) else {
            return false;
        };
        let v = test.value.as_str();
        match test.operator.as_deref() {
            None => true,
            Some("=") => actual == v,
            Some("~=") => actual.split_whitespace().any(|w| w == v),
            Some("|=") => actual == v || actual.starts_with(&format!("{}-", v)),
            Some("^=") => actual.starts_with(v),
            Some("$=") => actual.ends_with(v),
            Some("*=") => actual.contains(v),
            Some(_) => false,
        }
    })
}

struct Rule {
    selector: Selector,
    declarations: Vec<(String, String)>,
    order: usize,
}

/// Split sheet text into (selector list, declaration block) pairs. At-rules
/// and comments are dropped.
fn rule_blocks(css: &str) -> Vec<(String, String)> {
    let mut text = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        text.push_str(&rest[..start]);
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }
    text.push_str(rest);

    let mut blocks = Vec::new();
    let mut rest = text.as_str();
    while let Some(open) = rest.find('{') {
        let prelude = rest[..open].trim();
        // Find the matching close brace, allowing nesting inside at-rules.
        let mut depth = 0;
        let mut close = None;
        for (i, c) in rest[open..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else { break };
        let prelude = prelude.rsplit(';').next().unwrap_or(prelude).trim();
        if !prelude.starts_with('@') {
            blocks.push((prelude.to_string(), rest[open + 1..close].to_string()));
        }
        rest = &rest[close + 1..];
    }
    blocks
}

/// Declarations from every `<style>` element, matched to the nodes they
/// apply to in ascending specificity (ties in source order).
pub fn element_styles(doc: &Document) -> HashMap<usize, Vec<(String, String)>> {
    let mut rules = Vec::new();
    for idx in 0..doc.len() {
        let node = doc.node(idx);
        if node.name != "style" || node.foreign {
            continue;
        }
        for (selectors, body) in rule_blocks(&doc.text_content(idx)) {
            let declarations = parse_declarations(&body);
            for selector_text in selectors.split(',') {
                if let Some(selector) = Selector::parse(selector_text) {
                    let order = rules.len();
                    rules.push(Rule {
                        selector,
                        declarations: declarations.clone(),
                        order,
                    });
                }
            }
        }
    }
    rules.sort_by_key(|r| (r.selector.specificity(), r.order));

    let mut styles: HashMap<usize, Vec<(String, String)>> = HashMap::new();
    for rule in &rules {
        for idx in 0..doc.len() {
            if rule.selector.matches(doc, idx) {
                styles.entry(idx).or_default().extend(rule.declarations.iter().cloned());
            }
        }
    }
    styles
}
