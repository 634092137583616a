//! # Table of Contents
//!
//! Section ids, the list of TOC entries, and the TOC itself: one line per
//! section up to the configured depth, with a dot leader running to the
//! right-aligned page number.

use std::collections::{HashMap, HashSet};

use super::{Converter, Look};
use crate::draw::{DrawCall, TextAnchor, TextCall};
use crate::error::Result;
use crate::layout::{Align, FlowContext, ParagraphStyle};
use crate::model::{Block, Section};

/// A section listed in the table of contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub level: u8,
    pub id: String,
}

/// Anchor id for a title: `_` followed by the lowercase words joined with
/// `_`.
pub fn slug(title: &str) -> String {
    let mut id = String::from("_");
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            id.push(c);
        } else if !id.ends_with('_') {
            id.push('_');
        }
    }
    while id.len() > 1 && id.ends_with('_') {
        id.pop();
    }
    id
}

/// Give every section without an id one derived from its title, unique
/// across the document.
pub fn assign_ids(blocks: &mut [Block]) {
    let mut taken = HashSet::new();
    visit_sections(blocks, &mut |section| {
        if let Some(id) = &section.id {
            taken.insert(id.clone());
        }
    });
    visit_sections_mut(blocks, &mut |section| {
        if section.id.is_some() {
            return;
        }
        let base = slug(&section.title);
        let mut id = base.clone();
        let mut n = 2;
        while taken.contains(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        taken.insert(id.clone());
        section.id = Some(id);
    });
}

/// Sections up to `max_level`, in document order.
pub fn collect_entries(blocks: &[Block], max_level: u8) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    visit_sections(blocks, &mut |section| {
        if section.level <= max_level {
            entries.push(TocEntry {
                title: section.title.clone(),
                level: section.level,
                id: section_id(section),
            });
        }
    });
    entries
}

/// Section titles by id, for cross references without their own text.
pub fn section_titles(blocks: &[Block]) -> HashMap<String, String> {
    let mut titles = HashMap::new();
    visit_sections(blocks, &mut |section| {
        titles.insert(section_id(section), section.title.clone());
    });
    titles
}

pub fn section_id(section: &Section) -> String {
    section.id.clone().unwrap_or_else(|| slug(&section.title))
}

fn visit_sections(blocks: &[Block], f: &mut dyn FnMut(&Section)) {
    for block in blocks {
        if let Block::Section(section) = block {
            f(section);
            visit_sections(&section.blocks, f);
        }
    }
}

fn visit_sections_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Section)) {
    for block in blocks {
        if let Block::Section(section) = block {
            f(section);
            visit_sections_mut(&mut section.blocks, f);
        }
    }
}

impl Converter<'_> {
    pub(super) fn render_toc(&self, ctx: &mut FlowContext) -> Result<()> {
        self.title(ctx, &self.theme.toc.title)?;
        let look = self.look();
        for entry in &self.toc_entries {
            self.toc_line(ctx, entry, &look)?;
        }
        Ok(())
    }

    fn toc_line(&self, ctx: &mut FlowContext, entry: &TocEntry, look: &Look) -> Result<()> {
        let theme = &self.theme.toc;
        let run = self.text_run(entry.title.clone(), look);
        let key = run.style.font.clone();
        let gap = look.size / 2.0;
        // Fixed column for page numbers, so every pass wraps titles alike.
        let reserve = self.fonts.measure_string("0000", &key, look.size, 0.0);
        let indent = f64::from(entry.level.saturating_sub(1)) * theme.indent.pt();
        let style = ParagraphStyle {
            line_height: theme.line_height,
            align: Align::Left,
        };

        let lines = ctx.with_indent(indent, reserve + gap, |ctx| ctx.typeset(&[run], &style))?;
        let last = match lines.last() {
            Some(line) => *line,
            None => return Ok(()),
        };

        let number = self.page_of(&entry.id).unwrap_or_default();
        let right = ctx.bounds().right();
        let number_width = self.fonts.measure_string(&number, &key, look.size, 0.0);
        let mut calls = Vec::new();

        let leader_start = last.left + last.width + gap;
        let leader_end = right - number_width - gap;
        let dot_width = self.fonts.measure_string(&theme.dot_leader, &key, look.size, 0.0);
        if dot_width > 0.0 && leader_end > leader_start {
            let count = ((leader_end - leader_start) / dot_width).floor() as usize;
            let mut dots = TextCall::at(theme.dot_leader.repeat(count), leader_end, last.baseline, key.clone(), look.size);
            dots.anchor = TextAnchor::End;
            calls.push(dots);
        }
        let mut page = TextCall::at(number, right, last.baseline, key, look.size);
        page.anchor = TextAnchor::End;
        calls.push(page);

        let calls: Vec<DrawCall> = calls.into_iter().map(|text| self.colored_text(look.color, text)).collect();
        ctx.draw_on_page(last.page, calls);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, level: u8, id: Option<&str>, blocks: Vec<Block>) -> Block {
        Block::Section(Section {
            title: title.to_string(),
            level,
            id: id.map(str::to_string),
            blocks,
        })
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Getting Started!"), "_getting_started");
        assert_eq!(slug("  API / Reference  "), "_api_reference");
        assert_eq!(slug("!!!"), "_");
    }

    #[test]
    fn test_assign_ids_dedupes() {
        let mut blocks = vec![
            section("Intro", 1, None, vec![section("Details", 2, None, vec![])]),
            section("Intro", 1, None, vec![]),
            section("Other", 1, Some("_details"), vec![]),
        ];
        assign_ids(&mut blocks);
        let ids: Vec<String> = collect_entries(&blocks, 6).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["_intro", "_details_2", "_intro_2", "_details"]);
    }

    #[test]
    fn test_collect_entries_respects_levels() {
        let blocks = vec![section(
            "One",
            1,
            None,
            vec![section("Two", 2, None, vec![section("Three", 3, None, vec![])])],
        )];
        let titles: Vec<String> = collect_entries(&blocks, 2).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert_eq!(section_titles(&blocks).get("_three").map(String::as_str), Some("Three"));
    }
}
