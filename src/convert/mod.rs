//! # Document Conversion
//!
//! Walks the document's blocks and lays them out through a [`FlowContext`].
//!
//! Page numbers that appear in the text (table of contents, index, cross
//! references) are only known after layout, so a document is converted
//! twice. The first pass prints placeholders and records where every
//! anchor, section and index term landed. The second pass reads those
//! positions back as a [`Pagination`]. Page number columns have a fixed
//! width, so both passes break pages alike.
//!
//! Pages before the first body page (the table of contents and anything
//! ahead of it) are front matter and numbered in roman numerals. The
//! running footer is stamped on body pages only.

pub mod index;
pub mod toc;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::draw::{DrawCall, DrawOp, ImageRef, Point, TextAnchor, TextCall};
use crate::error::{Error, Result};
use crate::font::FontContext;
use crate::image_loader::{self, Dimensions};
use crate::layout::table::{layout_table, resolve_column_widths, TableBorders, TableSpec};
use crate::layout::{
    Align, ChunkKind, Destination, FlowContext, FlowPage, FlowRegistry, ParagraphStyle, PlacedLine, RegionStyle, Side,
};
use crate::model::{Block, Document, Edges, Inline, ListItem, Section, Table, TableCell};
use crate::pdf::OutlineEntry;
use crate::style::{BorderEdge, Color, RuleStyle, Theme};
use crate::svg::{Svg, SvgOptions};
use crate::text::{max_content_width, RunStyle, TextRun};
use crate::units::Length;
use toc::TocEntry;

/// Where things landed in an earlier pass.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub registry: FlowRegistry,
    /// Index of the first body page.
    pub body_start: usize,
}

/// The laid-out pages of one pass.
#[derive(Debug, Clone)]
pub struct Pass {
    pub pages: Vec<FlowPage>,
    pub pagination: Pagination,
}

impl Pass {
    /// Bookmarks for every section heading.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.pagination
            .registry
            .sections
            .iter()
            .map(|s| OutlineEntry {
                title: s.title.clone(),
                level: s.level,
                page: s.page,
                top: s.top,
            })
            .collect()
    }
}

/// Font and color of a text run.
#[derive(Debug, Clone)]
struct Look {
    family: String,
    bold: bool,
    italic: bool,
    size: f64,
    color: Color,
    underline: bool,
}

/// Anchors and index terms met while collecting a paragraph's runs.
#[derive(Debug, Default)]
struct Marks {
    anchors: Vec<String>,
    terms: Vec<Vec<String>>,
}

pub struct Converter<'d> {
    doc: &'d Document,
    theme: &'d Theme,
    fonts: &'d FontContext,
    /// The document's blocks with every section id filled in.
    blocks: Vec<Block>,
    toc_entries: Vec<TocEntry>,
    titles: HashMap<String, String>,
    known: Option<&'d Pagination>,
    report: bool,
    dimensions: RefCell<HashMap<String, Dimensions>>,
    images: RefCell<HashMap<String, ImageRef>>,
}

impl<'d> Converter<'d> {
    pub fn new(doc: &'d Document, fonts: &'d FontContext) -> Self {
        let mut blocks = doc.blocks.clone();
        toc::assign_ids(&mut blocks);
        let toc_entries = toc::collect_entries(&blocks, doc.theme.toc.levels);
        let titles = toc::section_titles(&blocks);
        Self {
            doc,
            theme: &doc.theme,
            fonts,
            blocks,
            toc_entries,
            titles,
            known: None,
            report: true,
            dimensions: RefCell::new(HashMap::new()),
            images: RefCell::new(HashMap::new()),
        }
    }

    /// Print page numbers from an earlier pass instead of placeholders.
    pub fn with_pagination(mut self, known: &'d Pagination) -> Self {
        self.known = Some(known);
        self
    }

    /// Don't log warnings; used for the first of two passes.
    pub fn quiet(mut self) -> Self {
        self.report = false;
        self
    }

    /// Lay out the whole document.
    pub fn run(&self) -> Result<Pass> {
        let mut ctx = FlowContext::new(self.fonts, &self.doc.page);
        let mut body_start = 0;

        match self.blocks.iter().position(|b| matches!(b, Block::Toc)) {
            Some(at) => {
                self.render_body(&mut ctx, &self.blocks[..at])?;
                if !ctx.at_page_top() {
                    ctx.start_new_page();
                }
                self.render_toc(&mut ctx)?;
                ctx.start_new_page();
                body_start = ctx.page_index();
                self.render_body(&mut ctx, &self.blocks[at + 1..])?;
            }
            None => self.render_body(&mut ctx, &self.blocks)?,
        }

        self.render_footnotes(&mut ctx)?;
        self.stamp_footers(&mut ctx, body_start);
        log::debug!(
            "converted {} pages ({} front matter)",
            ctx.page_count(),
            body_start
        );

        let (pages, registry) = ctx.into_parts();
        Ok(Pass {
            pages,
            pagination: Pagination { registry, body_start },
        })
    }

    /// Height of `blocks` laid out at the width of `ctx`.
    pub fn measure(&self, ctx: &FlowContext, blocks: &[Block]) -> Result<f64> {
        Ok(ctx.measure_height(|c| self.render_blocks(c, blocks))?.total)
    }

    fn render_body(&self, ctx: &mut FlowContext, blocks: &[Block]) -> Result<()> {
        let page = &self.doc.page;
        ctx.column_box(page.columns, page.column_gap.pt(), |ctx| self.render_blocks(ctx, blocks))
    }

    pub(crate) fn render_blocks(&self, ctx: &mut FlowContext, blocks: &[Block]) -> Result<()> {
        for block in blocks {
            self.render_block(ctx, block)?;
        }
        Ok(())
    }

    fn render_block(&self, ctx: &mut FlowContext, block: &Block) -> Result<()> {
        match block {
            Block::Section(section) => self.render_section(ctx, section),
            Block::Paragraph { inlines } => {
                self.typeset_inlines(ctx, None, inlines, &self.look())?;
                self.margin_after(ctx);
                Ok(())
            }
            Block::List { ordered, items } => self.render_list(ctx, *ordered, items),
            Block::Table(table) => self.render_table(ctx, table),
            Block::Image { src, width, alt } => self.render_image(ctx, src, *width, alt.as_deref()),
            Block::Svg { content, width } => self.render_svg(ctx, content, *width),
            Block::Code { text, caption } => self.render_code(ctx, text, caption.as_deref()),
            Block::Admonition { label, blocks, caption } => {
                self.render_admonition(ctx, label, blocks, caption.as_deref())
            }
            Block::Sidebar { title, blocks } => self.render_sidebar(ctx, title.as_deref(), blocks),
            Block::Rule { style } => {
                let rule = &self.theme.rule;
                ctx.stroke_horizontal_rule(style.unwrap_or(rule.style), rule.width, rule.color);
                self.margin_after(ctx);
                Ok(())
            }
            Block::PageBreak => {
                if !ctx.at_page_top() {
                    ctx.advance_page();
                }
                Ok(())
            }
            Block::Toc => {
                self.warn(ctx, "only the first top-level table of contents is rendered".to_string());
                Ok(())
            }
            Block::Index => self.render_index(ctx),
            Block::ColumnBox(column_box) => {
                let gap = column_box.gap.unwrap_or(self.doc.page.column_gap).pt();
                ctx.column_box(column_box.columns, gap, |ctx| self.render_blocks(ctx, &column_box.blocks))?;
                self.margin_after(ctx);
                Ok(())
            }
        }
    }

    // ── Headings ────────────────────────────────────────────────

    fn render_section(&self, ctx: &mut FlowContext, section: &Section) -> Result<()> {
        let heading = &self.theme.heading;
        let id = toc::section_id(section);
        let runs = [self.text_run(section.title.clone(), &self.heading_look(section.level))];
        let style = ParagraphStyle {
            line_height: heading.line_height,
            align: Align::Left,
        };

        ctx.apply_margin(heading.margin_top.pt(), Side::Top);

        // Keep the heading with the first line of what follows.
        let height = ctx.measure_height(|c| c.typeset(&runs, &style).map(drop))?.total;
        let follow = self.theme.base.font_size * self.theme.base.line_height;
        if height + heading.margin_bottom.pt() + follow > ctx.cursor() && !ctx.at_page_top() {
            ctx.move_past_bottom();
        }

        ctx.register_anchor(&id);
        ctx.register_section(&section.title, section.level, &id);
        ctx.typeset(&runs, &style)?;
        ctx.apply_margin(heading.margin_bottom.pt(), Side::Bottom);
        self.render_blocks(ctx, &section.blocks)
    }

    /// A level-one heading that is not a section, such as the TOC title.
    fn title(&self, ctx: &mut FlowContext, text: &str) -> Result<()> {
        let heading = &self.theme.heading;
        let style = ParagraphStyle {
            line_height: heading.line_height,
            align: Align::Left,
        };
        ctx.apply_margin(heading.margin_top.pt(), Side::Top);
        ctx.typeset(&[self.text_run(text, &self.heading_look(1))], &style)?;
        ctx.apply_margin(heading.margin_bottom.pt(), Side::Bottom);
        Ok(())
    }

    // ── Lists ───────────────────────────────────────────────────

    fn render_list(&self, ctx: &mut FlowContext, ordered: bool, items: &[ListItem]) -> Result<()> {
        let list = &self.theme.list;
        let look = self.look();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                ctx.apply_margin(list.item_spacing.pt(), Side::Top);
            }
            let marker = if ordered {
                format!("{}.", i + 1)
            } else {
                list.marker.clone()
            };
            ctx.with_indent(list.indent.pt(), 0.0, |ctx| {
                let left = ctx.bounds().left;
                let (page, baseline) = if item.inlines.is_empty() {
                    (ctx.page_index(), ctx.y() - look.size)
                } else {
                    let lines = self.typeset_inlines(ctx, None, &item.inlines, &look)?;
                    lines
                        .first()
                        .map(|l| (l.page, l.baseline))
                        .unwrap_or((ctx.page_index(), ctx.y()))
                };
                let run = self.text_run(marker.clone(), &look);
                let mut text = TextCall::at(run.text, left - look.size / 2.0, baseline, run.style.font, look.size);
                text.anchor = TextAnchor::End;
                ctx.draw_on_page(page, vec![self.colored_text(look.color, text)]);

                if !item.blocks.is_empty() {
                    ctx.apply_margin(list.item_spacing.pt(), Side::Top);
                    self.render_blocks(ctx, &item.blocks)?;
                }
                Ok(())
            })?;
        }
        self.margin_after(ctx);
        Ok(())
    }

    // ── Tables ──────────────────────────────────────────────────

    fn render_table(&self, ctx: &mut FlowContext, table: &Table) -> Result<()> {
        let theme = &self.theme.table;
        let padding = theme.cell_padding.pt();
        let look = self.look();
        let column_count = table
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(table.columns.len());
        if column_count == 0 || table.rows.is_empty() {
            return Ok(());
        }

        if let Some(caption) = &table.caption {
            self.caption(ctx, Some(caption.as_str()))?;
        }

        let natural: Vec<f64> = (0..column_count)
            .map(|col| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| self.natural_width(cell, &look) + padding * 2.0)
                    .fold(0.0, f64::max)
            })
            .collect();
        let spec = TableSpec {
            widths: resolve_column_widths(&table.columns, ctx.bounds().width, &natural),
            header_rows: table.header_rows,
            row_count: table.rows.len(),
            borders: table.borders.unwrap_or_else(|| TableBorders::uniform(theme.border)),
            padding,
            head_background: theme.head_background,
        };

        let mut render = |ctx: &mut FlowContext, row: usize, col: usize| -> Result<()> {
            let mut look = look.clone();
            look.bold = row < table.header_rows && theme.head_bold;
            match table.rows[row].get(col) {
                None => Ok(()),
                Some(TableCell::Text(text)) => ctx
                    .typeset(&[self.text_run(text.clone(), &look)], &self.body_style())
                    .map(drop),
                Some(TableCell::Inlines { inlines }) => self.typeset_inlines(ctx, None, inlines, &look).map(drop),
                Some(TableCell::Blocks { blocks }) => self.render_blocks(ctx, blocks),
            }
        };
        layout_table(ctx, &spec, &mut render)?;
        self.margin_after(ctx);
        Ok(())
    }

    fn natural_width(&self, cell: &TableCell, look: &Look) -> f64 {
        let text = match cell {
            TableCell::Text(text) => text.clone(),
            TableCell::Inlines { inlines } => Inline::plain_text(inlines),
            TableCell::Blocks { .. } => return 0.0,
        };
        max_content_width(self.fonts, &[self.text_run(text, look)])
    }

    // ── Images and SVG ──────────────────────────────────────────

    fn render_image(&self, ctx: &mut FlowContext, src: &str, width: Option<Length>, alt: Option<&str>) -> Result<()> {
        if let Err(e) = self.place_image(ctx, src, width) {
            self.warn(ctx, format!("image skipped: {}", e));
            let look = Look {
                italic: true,
                ..self.look()
            };
            let text = alt.unwrap_or("[image]");
            ctx.typeset(&[self.text_run(text, &look)], &self.body_style())?;
        }
        self.margin_after(ctx);
        Ok(())
    }

    fn place_image(&self, ctx: &mut FlowContext, src: &str, width: Option<Length>) -> Result<()> {
        let (natural_width, natural_height) = self.dimensions(src)?.points();
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return Err(Error::Image("image has no pixels".to_string()));
        }
        let mut width = width.map(|w| w.pt()).unwrap_or(natural_width).min(ctx.bounds().width);
        let mut height = width * natural_height / natural_width;
        let max_height = ctx.region_height();
        if height > max_height {
            width *= max_height / height;
            height = max_height;
        }

        let image = self.image(src)?;
        if height > ctx.cursor() && !ctx.at_page_top() {
            ctx.move_past_bottom();
        }
        let at = Point::new(ctx.bounds().left, ctx.y());
        ctx.draw(DrawCall::leaf(DrawOp::Image {
            image,
            at,
            width,
            height,
        }));
        ctx.move_down(height);
        Ok(())
    }

    fn dimensions(&self, src: &str) -> Result<Dimensions> {
        if let Some(dims) = self.dimensions.borrow().get(src) {
            return Ok(*dims);
        }
        let dims = image_loader::intrinsic_dimensions(src)?;
        self.dimensions.borrow_mut().insert(src.to_string(), dims);
        Ok(dims)
    }

    fn image(&self, src: &str) -> Result<ImageRef> {
        if let Some(image) = self.images.borrow().get(src) {
            return Ok(image.clone());
        }
        let loaded = image_loader::load_image(src)?;
        let mut images = self.images.borrow_mut();
        let image = ImageRef {
            id: format!("Im{}", images.len() + 1),
            image: Rc::new(loaded),
        };
        images.insert(src.to_string(), image.clone());
        Ok(image)
    }

    fn render_svg(&self, ctx: &mut FlowContext, content: &str, width: Option<Length>) -> Result<()> {
        let available = ctx.bounds().width;
        let svg = match self.parse_svg(ctx, content, width.map(|w| w.pt())) {
            Some(svg) if svg.width > available => self.parse_svg(ctx, content, Some(available)),
            other => other,
        };
        let svg = match svg {
            Some(svg) => svg,
            None => return Ok(()),
        };

        if svg.height > ctx.cursor() && !ctx.at_page_top() {
            ctx.move_past_bottom();
        }
        let at = Point::new(ctx.bounds().left, ctx.y());
        ctx.draw(DrawCall::scope(
            DrawOp::BoundingBox {
                at,
                width: svg.width,
                height: svg.height,
            },
            svg.calls,
        ));
        ctx.move_down(svg.height);
        self.margin_after(ctx);
        Ok(())
    }

    fn parse_svg(&self, ctx: &FlowContext, content: &str, width: Option<f64>) -> Option<Svg> {
        let options = SvgOptions {
            width,
            height: None,
            bounds: (ctx.bounds().width, ctx.region_height()),
            fonts: Some(self.fonts.registry()),
            fallback_font: Some(self.theme.base.font_family.clone()),
        };
        match Svg::parse(content, &options) {
            Ok(svg) => Some(svg),
            Err(e) => {
                self.warn(ctx, format!("SVG skipped: {}", e));
                None
            }
        }
    }

    // ── Boxes ───────────────────────────────────────────────────

    fn render_code(&self, ctx: &mut FlowContext, text: &str, caption: Option<&str>) -> Result<()> {
        let code = &self.theme.code;
        let look = Look {
            family: code.font_family.clone(),
            bold: false,
            italic: false,
            size: code.font_size,
            color: code.font_color,
            underline: false,
        };
        let text = text.trim_end_matches('\n').replace('\t', "    ");
        let runs = [self.text_run(text, &look)];
        let para = ParagraphStyle {
            line_height: code.line_height,
            align: Align::Left,
        };
        let style = RegionStyle {
            background: Some(code.background),
            border: Some(BorderEdge {
                width: code.border_width,
                color: code.border_color,
                style: RuleStyle::Solid,
            }),
            radius: code.border_radius,
        };
        let padding = Edges::uniform(code.padding.pt());

        ctx.keep_together(|ctx, _| {
            let caption_height = self.caption_height(ctx, caption)?;
            ctx.bordered_region(&style, caption_height, |ctx| {
                self.caption(ctx, caption)?;
                ctx.pad_box(padding, |ctx| ctx.typeset(&runs, &para).map(drop))
            })
            .map(drop)
        })?;
        self.margin_after(ctx);
        Ok(())
    }

    fn render_admonition(&self, ctx: &mut FlowContext, label: &str, blocks: &[Block], caption: Option<&str>) -> Result<()> {
        let theme = &self.theme.admonition;
        let label_width = theme.label_width.pt();
        let padding = theme.padding.pt();
        let style = RegionStyle {
            background: theme.background,
            border: None,
            radius: 0.0,
        };
        let separator = BorderEdge {
            width: theme.border_width,
            color: theme.border_color,
            style: RuleStyle::Solid,
        };
        let label_look = Look {
            bold: true,
            color: theme.label_color,
            ..self.look()
        };
        let label_run = self.text_run(label.to_uppercase(), &label_look);

        ctx.keep_together(|ctx, _| {
            let caption_height = self.caption_height(ctx, caption)?;
            let ((), chunks) = ctx.bordered_region(&style, caption_height, |ctx| {
                self.caption(ctx, caption)?;
                ctx.with_indent(label_width + padding, 0.0, |ctx| {
                    ctx.pad(padding, padding, |ctx| self.render_blocks(ctx, blocks))
                })
            })?;
            if ctx.is_scratch() {
                return Ok(());
            }
            for chunk in &chunks {
                let x = chunk.left + label_width;
                let mut calls = crate::layout::border::edge_calls(
                    Point::new(x, chunk.top),
                    Point::new(x, chunk.bottom),
                    &separator,
                );
                if matches!(chunk.kind, ChunkKind::Only | ChunkKind::First) {
                    let mut text = TextCall::at(
                        label_run.text.clone(),
                        chunk.left + label_width / 2.0,
                        chunk.top - padding - label_look.size,
                        label_run.style.font.clone(),
                        label_look.size,
                    );
                    text.anchor = TextAnchor::Middle;
                    calls.push(self.colored_text(label_look.color, text));
                }
                ctx.draw_on_page(chunk.page, calls);
            }
            Ok(())
        })?;
        self.margin_after(ctx);
        Ok(())
    }

    fn render_sidebar(&self, ctx: &mut FlowContext, title: Option<&str>, blocks: &[Block]) -> Result<()> {
        let theme = &self.theme.sidebar;
        let style = RegionStyle {
            background: Some(theme.background),
            border: Some(BorderEdge {
                width: theme.border_width,
                color: theme.border_color,
                style: RuleStyle::Solid,
            }),
            radius: theme.border_radius,
        };
        let title_look = Look {
            bold: true,
            size: theme.title_size,
            ..self.look()
        };
        let title_style = ParagraphStyle {
            line_height: self.theme.heading.line_height,
            align: Align::Center,
        };
        let padding = Edges::uniform(theme.padding.pt());

        ctx.keep_together(|ctx, _| {
            ctx.bordered_region(&style, 0.0, |ctx| {
                ctx.pad_box(padding, |ctx| {
                    if let Some(title) = title {
                        ctx.typeset(&[self.text_run(title, &title_look)], &title_style)?;
                        ctx.apply_margin(title_look.size / 2.0, Side::Bottom);
                    }
                    self.render_blocks(ctx, blocks)
                })
            })
            .map(drop)
        })?;
        self.margin_after(ctx);
        Ok(())
    }

    /// An italic line above a block, followed by the caption's inner margin.
    fn caption(&self, ctx: &mut FlowContext, caption: Option<&str>) -> Result<()> {
        let text = match caption {
            Some(text) => text,
            None => return Ok(()),
        };
        let theme = &self.theme.caption;
        let look = Look {
            italic: theme.italic,
            color: theme.font_color,
            ..self.look()
        };
        ctx.typeset(&[self.text_run(text, &look)], &self.body_style())?;
        ctx.move_down(theme.margin_inside.pt());
        Ok(())
    }

    fn caption_height(&self, ctx: &FlowContext, caption: Option<&str>) -> Result<f64> {
        if caption.is_none() {
            return Ok(0.0);
        }
        Ok(ctx.measure_height(|c| self.caption(c, caption))?.total)
    }

    // ── Footnotes and footer ────────────────────────────────────

    fn render_footnotes(&self, ctx: &mut FlowContext) -> Result<()> {
        let notes = ctx.registry().footnotes.clone();
        if notes.is_empty() {
            return Ok(());
        }
        let theme = &self.theme.footnotes;
        let look = Look {
            size: theme.font_size,
            ..self.look()
        };

        ctx.apply_margin(self.theme.block.margin_bottom.pt(), Side::Top);
        match &theme.title {
            Some(title) => {
                let bold = Look {
                    bold: true,
                    ..look.clone()
                };
                ctx.typeset(&[self.text_run(title.clone(), &bold)], &self.body_style())?;
            }
            None => {
                let width = ctx.bounds().width;
                let rule = &self.theme.rule;
                ctx.with_indent(0.0, width * 2.0 / 3.0, |ctx| {
                    ctx.stroke_horizontal_rule(RuleStyle::Solid, rule.width, rule.color);
                    Ok(())
                })?;
            }
        }
        ctx.move_down(look.size / 2.0);

        for note in &notes {
            let number = self.text_run(format!("[{}] ", note.number), &look);
            self.typeset_inlines(ctx, Some(number), &note.inlines, &look)?;
        }
        Ok(())
    }

    fn stamp_footers(&self, ctx: &mut FlowContext, body_start: usize) {
        let footer = &self.theme.footer;
        if !footer.enabled {
            return;
        }
        let total = ctx.page_count().saturating_sub(body_start);
        let (width, _) = ctx.page_size();
        let baseline = ctx.margin().bottom / 2.0;
        let look = Look {
            size: footer.font_size,
            color: footer.font_color,
            ..self.look()
        };
        let (font, _) = self.fonts.resolve(&look.family, 400, false);

        for page in body_start..ctx.page_count() {
            let label = footer
                .template
                .replace("{page}", &(page - body_start + 1).to_string())
                .replace("{total}", &total.to_string());
            let mut text = TextCall::at(label, width / 2.0, baseline, font.clone(), look.size);
            text.anchor = TextAnchor::Middle;
            ctx.draw_on_page(page, vec![self.colored_text(look.color, text)]);
        }
    }

    // ── Inline content ──────────────────────────────────────────

    /// Typeset `inlines` as one paragraph. Anchors and index terms point at
    /// the first placed line, which may sit on a later page than the cursor
    /// did before the paragraph started.
    fn typeset_inlines(
        &self,
        ctx: &mut FlowContext,
        lead: Option<TextRun>,
        inlines: &[Inline],
        look: &Look,
    ) -> Result<Vec<PlacedLine>> {
        let mut runs: Vec<TextRun> = lead.into_iter().collect();
        let mut marks = Marks::default();
        self.collect_runs(ctx, inlines, look, &mut runs, &mut marks);
        let lines = ctx.typeset(&runs, &self.body_style())?;

        let at = match lines.first() {
            Some(line) => Destination {
                page: line.page,
                top: line.top,
            },
            None => Destination {
                page: ctx.page_index(),
                top: ctx.y(),
            },
        };
        for id in &marks.anchors {
            ctx.register_anchor_at(id, at);
        }
        for terms in &marks.terms {
            ctx.register_index_term_on(terms, at.page);
        }
        Ok(lines)
    }

    fn collect_runs(
        &self,
        ctx: &mut FlowContext,
        inlines: &[Inline],
        look: &Look,
        out: &mut Vec<TextRun>,
        marks: &mut Marks,
    ) {
        for inline in inlines {
            match inline {
                Inline::Text { text } => out.push(self.text_run(text.clone(), look)),
                Inline::Strong { inlines } => {
                    let look = Look {
                        bold: true,
                        ..look.clone()
                    };
                    self.collect_runs(ctx, inlines, &look, out, marks);
                }
                Inline::Emphasis { inlines } => {
                    let look = Look {
                        italic: true,
                        ..look.clone()
                    };
                    self.collect_runs(ctx, inlines, &look, out, marks);
                }
                Inline::Monospace { inlines } => {
                    let look = Look {
                        family: self.theme.code.font_family.clone(),
                        color: self.theme.code.font_color,
                        ..look.clone()
                    };
                    self.collect_runs(ctx, inlines, &look, out, marks);
                }
                Inline::IndexTerm { terms, visible } => {
                    marks.terms.push(terms.clone());
                    if *visible {
                        if let Some(primary) = terms.first() {
                            out.push(self.text_run(primary.clone(), look));
                        }
                    }
                }
                Inline::Anchor { id } => marks.anchors.push(id.clone()),
                Inline::Footnote { inlines } => {
                    let number = ctx.add_footnote(inlines);
                    out.push(self.text_run(format!("[{}]", number), look));
                }
                Inline::Xref { target, text } => {
                    let label = text
                        .clone()
                        .or_else(|| self.titles.get(target).cloned())
                        .unwrap_or_else(|| target.clone());
                    let rendered = match self.page_of(target) {
                        Some(page) => format!("{} (page {})", label, page),
                        None => {
                            self.warn(ctx, format!("unresolved cross reference '{}'", target));
                            label
                        }
                    };
                    out.push(self.text_run(rendered, look));
                }
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn look(&self) -> Look {
        let base = &self.theme.base;
        Look {
            family: base.font_family.clone(),
            bold: false,
            italic: false,
            size: base.font_size,
            color: base.font_color,
            underline: false,
        }
    }

    fn heading_look(&self, level: u8) -> Look {
        let heading = &self.theme.heading;
        Look {
            family: heading
                .font_family
                .clone()
                .unwrap_or_else(|| self.theme.base.font_family.clone()),
            bold: true,
            size: heading.size(level),
            color: heading.font_color,
            ..self.look()
        }
    }

    fn text_run(&self, text: impl Into<String>, look: &Look) -> TextRun {
        let weight = if look.bold { 700 } else { 400 };
        let (font, _) = self.fonts.resolve(&look.family, weight, look.italic);
        TextRun::new(
            text,
            RunStyle {
                font,
                size: look.size,
                color: look.color,
                underline: look.underline,
            },
        )
    }

    fn body_style(&self) -> ParagraphStyle {
        ParagraphStyle {
            line_height: self.theme.base.line_height,
            align: Align::Left,
        }
    }

    fn margin_after(&self, ctx: &mut FlowContext) {
        ctx.apply_margin(self.theme.block.margin_bottom.pt(), Side::Bottom);
    }

    fn colored_text(&self, color: Color, text: TextCall) -> DrawCall {
        DrawCall::scope(
            DrawOp::SaveGraphicsState,
            vec![
                DrawCall::leaf(DrawOp::FillColor(color)),
                DrawCall::leaf(DrawOp::DrawText(text)),
            ],
        )
    }

    /// The printed number of `page`: roman in the front matter, counting
    /// from one at the first body page otherwise. A placeholder before
    /// pagination is known.
    fn page_label(&self, page: usize) -> String {
        match self.known {
            None => "0".to_string(),
            Some(known) if page < known.body_start => roman(page + 1),
            Some(known) => (page - known.body_start + 1).to_string(),
        }
    }

    /// Printed page number of an anchor. Always a placeholder in the first
    /// pass; `None` when a later pass doesn't know the anchor.
    fn page_of(&self, id: &str) -> Option<String> {
        match self.known {
            None => Some(self.page_label(0)),
            Some(known) => known.registry.anchors.get(id).map(|d| self.page_label(d.page)),
        }
    }

    fn warn(&self, ctx: &FlowContext, message: String) {
        if self.report && !ctx.is_scratch() {
            log::warn!("{}", message);
        }
    }
}

/// Lowercase roman numeral.
pub fn roman(mut n: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(doc: &Document) -> (Pass, Pass) {
        let fonts = FontContext::new();
        let first = Converter::new(doc, &fonts).quiet().run().unwrap();
        let second = Converter::new(doc, &fonts)
            .with_pagination(&first.pagination)
            .run()
            .unwrap();
        (first, second)
    }

    fn document(blocks: Vec<Block>) -> Document {
        Document {
            blocks,
            ..Document::default()
        }
    }

    fn section(title: &str, level: u8, blocks: Vec<Block>) -> Block {
        Block::Section(Section {
            title: title.to_string(),
            level,
            id: None,
            blocks,
        })
    }

    fn texts(page: &FlowPage) -> Vec<String> {
        fn walk(calls: &[DrawCall], out: &mut Vec<String>) {
            for call in calls {
                if let DrawOp::DrawText(text) = &call.op {
                    out.push(text.text.clone());
                }
                walk(&call.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&page.calls, &mut out);
        out
    }

    #[test]
    fn test_roman() {
        assert_eq!(roman(1), "i");
        assert_eq!(roman(4), "iv");
        assert_eq!(roman(14), "xiv");
        assert_eq!(roman(1994), "mcmxciv");
    }

    #[test]
    fn test_marks_follow_paragraph_to_next_page() {
        let doc = document(vec![]);
        let fonts = FontContext::new();
        let converter = Converter::new(&doc, &fonts);
        let mut ctx = FlowContext::new(&fonts, &doc.page);
        let room = ctx.cursor() - 2.0;
        ctx.move_down(room);
        assert_eq!(ctx.page_index(), 0);

        let paragraph = Block::Paragraph {
            inlines: vec![
                Inline::Anchor { id: "spot".to_string() },
                Inline::IndexTerm {
                    terms: vec!["Cats".to_string()],
                    visible: false,
                },
                Inline::Text {
                    text: "Moved along".to_string(),
                },
            ],
        };
        converter.render_blocks(&mut ctx, &[paragraph]).unwrap();

        assert_eq!(ctx.page_index(), 1);
        assert_eq!(ctx.registry().anchors["spot"].page, 1);
        assert_eq!(ctx.registry().index_terms, vec![(vec!["Cats".to_string()], 1)]);
        assert!(texts(&ctx.pages()[1]).contains(&"Moved along".to_string()));
        assert!(texts(&ctx.pages()[0]).is_empty());
    }

    #[test]
    fn test_paragraphs_make_one_page() {
        let doc = document(vec![Block::paragraph("Hello"), Block::paragraph("World")]);
        let (_, pass) = render(&doc);
        assert_eq!(pass.pages.len(), 1);
        let texts = texts(&pass.pages[0]);
        assert!(texts.contains(&"Hello".to_string()));
        assert!(texts.contains(&"1".to_string()), "footer: {:?}", texts);
    }

    #[test]
    fn test_toc_is_front_matter() {
        let doc = document(vec![
            Block::Toc,
            section("Intro", 1, vec![Block::paragraph("Body")]),
            Block::PageBreak,
            section("Usage", 1, vec![Block::paragraph("More")]),
        ]);
        let (first, second) = render(&doc);
        assert_eq!(first.pages.len(), second.pages.len());
        assert_eq!(second.pagination.body_start, 1);
        assert_eq!(second.pages.len(), 3);

        let toc = texts(&second.pages[0]);
        assert!(toc.contains(&"Table of Contents".to_string()));
        assert!(toc.contains(&"Intro".to_string()));
        assert!(toc.contains(&"2".to_string()), "usage is on body page 2: {:?}", toc);
        assert!(texts(&second.pages[1]).contains(&"1".to_string()));
    }

    #[test]
    fn test_outline_follows_sections() {
        let doc = document(vec![section("One", 1, vec![section("Two", 2, vec![])])]);
        let (_, pass) = render(&doc);
        let outline = pass.outline();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, "One");
        assert_eq!(outline[1].level, 2);
        assert_eq!(outline[1].page, 0);
    }

    #[test]
    fn test_xref_prints_target_page() {
        let doc = document(vec![
            Block::Paragraph {
                inlines: vec![Inline::Xref {
                    target: "_later".to_string(),
                    text: None,
                }],
            },
            Block::PageBreak,
            section("Later", 1, vec![]),
        ]);
        let (first, second) = render(&doc);
        assert!(texts(&first.pages[0]).contains(&"Later (page 0)".to_string()));
        assert!(texts(&second.pages[0]).contains(&"Later (page 2)".to_string()));
    }

    #[test]
    fn test_footnotes_render_after_body() {
        let doc = document(vec![Block::Paragraph {
            inlines: vec![
                Inline::text("Claim"),
                Inline::Footnote {
                    inlines: vec![Inline::text("Source")],
                },
            ],
        }]);
        let (_, pass) = render(&doc);
        assert_eq!(pass.pagination.registry.footnotes.len(), 1);
        let texts = texts(&pass.pages[0]);
        assert!(texts.contains(&"Claim[1]".to_string()), "{:?}", texts);
        assert!(texts.contains(&"[1] Source".to_string()), "{:?}", texts);
    }

    #[test]
    fn test_index_lists_terms() {
        let doc = document(vec![
            Block::Paragraph {
                inlines: vec![Inline::IndexTerm {
                    terms: vec!["Widgets".to_string()],
                    visible: true,
                }],
            },
            Block::Index,
        ]);
        let (_, pass) = render(&doc);
        let texts = texts(&pass.pages[0]);
        assert!(texts.contains(&"Index".to_string()));
        assert!(texts.contains(&"W".to_string()));
        assert!(texts.iter().any(|t| t.starts_with("Widgets,")), "{:?}", texts);
    }

    #[test]
    fn test_broken_image_falls_back_to_alt_text() {
        let doc = document(vec![Block::Image {
            src: "./missing.png".to_string(),
            width: None,
            alt: Some("A diagram".to_string()),
        }]);
        let (_, pass) = render(&doc);
        assert!(texts(&pass.pages[0]).iter().any(|t| t.contains("diagram")));
    }

    #[test]
    fn test_footer_disabled() {
        let mut doc = document(vec![Block::paragraph("x")]);
        doc.theme.footer.enabled = false;
        let (_, pass) = render(&doc);
        assert_eq!(texts(&pass.pages[0]), vec!["x"]);
    }
}
