//! Integration tests for the Folio rendering pipeline.
//!
//! These tests exercise the full path from JSON input to PDF output.
//! They verify:
//! - JSON deserialization works correctly
//! - Content flows onto the right number of pages
//! - PDF output is structurally valid
//! - Front matter, outline and page numbers are consistent
//! - Tables, boxes, images and SVG survive page boundaries

use folio::convert::{Converter, Pass};
use folio::draw::{DrawCall, DrawOp};
use folio::font::FontContext;
use folio::layout::FlowPage;
use folio::model::*;

// ─── Helpers ────────────────────────────────────────────────────

fn doc(blocks: Vec<Block>) -> Document {
    Document {
        blocks,
        ..Document::default()
    }
}

fn text_para(text: &str) -> Block {
    Block::paragraph(text)
}

fn section(title: &str, level: u8, blocks: Vec<Block>) -> Block {
    Block::Section(Section {
        title: title.to_string(),
        level,
        id: None,
        blocks,
    })
}

/// Both passes, the way `folio::render` runs them.
fn layout_doc(doc: &Document) -> Pass {
    let fonts = FontContext::new();
    let first = Converter::new(doc, &fonts).quiet().run().unwrap();
    Converter::new(doc, &fonts)
        .with_pagination(&first.pagination)
        .run()
        .unwrap()
}

fn render_to_pdf(doc: &Document) -> Vec<u8> {
    folio::render(doc).unwrap()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 50, "PDF too small to be valid");
    assert!(bytes.starts_with(b"%PDF-1.7"), "Missing PDF header");
    assert!(
        bytes.windows(5).any(|w| w == b"%%EOF"),
        "Missing %%EOF marker"
    );
    assert!(bytes.windows(4).any(|w| w == b"xref"), "Missing xref table");
    assert!(bytes.windows(7).any(|w| w == b"trailer"), "Missing trailer");
}

fn pdf_page_count(bytes: &[u8]) -> usize {
    let needle = b"/Type /Page /Parent";
    bytes.windows(needle.len()).filter(|w| w == needle).count()
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

fn count_ops(page: &FlowPage, pred: &dyn Fn(&DrawOp) -> bool) -> usize {
    fn walk(calls: &[DrawCall], pred: &dyn Fn(&DrawOp) -> bool) -> usize {
        calls
            .iter()
            .map(|c| usize::from(pred(&c.op)) + walk(&c.children, pred))
            .sum()
    }
    walk(&page.calls, pred)
}

fn png_data_uri(width: u32, height: u32) -> String {
    use base64::Engine;
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 200, 255]));
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(encoder, img.as_raw(), width, height, image::ColorType::Rgba8).unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buf)
    )
}

// ─── Basic Pipeline Tests ───────────────────────────────────────

#[test]
fn test_empty_document_is_one_blank_page() {
    let bytes = render_to_pdf(&doc(vec![]));
    assert_valid_pdf(&bytes);
    assert_eq!(pdf_page_count(&bytes), 1);
}

#[test]
fn test_single_paragraph_produces_valid_pdf() {
    let bytes = render_to_pdf(&doc(vec![text_para("Hello, World!")]));
    assert_valid_pdf(&bytes);
    assert_eq!(pdf_page_count(&bytes), 1);
}

#[test]
fn test_explicit_page_breaks() {
    let pass = layout_doc(&doc(vec![
        text_para("Page 1"),
        Block::PageBreak,
        text_para("Page 2"),
        Block::PageBreak,
        text_para("Page 3"),
    ]));
    assert_eq!(pass.pages.len(), 3);
    assert!(texts(&pass.pages[2]).contains(&"Page 3".to_string()));
}

#[test]
fn test_page_break_at_page_top_is_ignored() {
    let pass = layout_doc(&doc(vec![Block::PageBreak, text_para("Only page")]));
    assert_eq!(pass.pages.len(), 1);
}

// ─── Page Overflow Tests ────────────────────────────────────────

#[test]
fn test_content_overflow_creates_new_page() {
    // A4 with 54pt margins leaves about 734pt; a 10.5pt line is about 12pt
    // tall plus a 12pt gap, so 100 paragraphs need several pages.
    let blocks = (0..100).map(|i| text_para(&format!("Line {}", i))).collect();
    let pass = layout_doc(&doc(blocks));
    assert!(
        pass.pages.len() >= 3,
        "100 paragraphs should overflow, got {} pages",
        pass.pages.len()
    );
    let last = texts(pass.pages.last().unwrap());
    assert!(last.contains(&"Line 99".to_string()));
}

#[test]
fn test_footer_counts_body_pages() {
    let mut d = doc(vec![text_para("a"), Block::PageBreak, text_para("b")]);
    d.theme.footer.template = "{page} of {total}".to_string();
    let pass = layout_doc(&d);
    assert!(texts(&pass.pages[0]).contains(&"1 of 2".to_string()));
    assert!(texts(&pass.pages[1]).contains(&"2 of 2".to_string()));
}

// ─── Front Matter and Outline Tests ─────────────────────────────

#[test]
fn test_toc_pages_get_roman_labels() {
    let d = doc(vec![
        Block::Toc,
        section("Chapter One", 1, vec![text_para("Body")]),
        section("Chapter Two", 1, vec![text_para("More")]),
    ]);
    let bytes = render_to_pdf(&d);
    assert_valid_pdf(&bytes);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/PageLabels << /Nums [0 << /S /r >> 1 << /S /D >>] >>"));
    assert!(text.contains("/Type /Outlines /Count 2"));
    assert!(text.contains("/Title (Chapter One) "));
}

#[test]
fn test_toc_lists_body_page_numbers() {
    let d = doc(vec![
        Block::Toc,
        section("Alpha", 1, vec![text_para("a")]),
        Block::PageBreak,
        section("Beta", 1, vec![section("Beta Detail", 2, vec![]), section("Too Deep", 3, vec![])]),
    ]);
    let pass = layout_doc(&d);
    assert_eq!(pass.pagination.body_start, 1);

    let toc = texts(&pass.pages[0]);
    assert!(toc.contains(&"Alpha".to_string()));
    assert!(toc.contains(&"Beta Detail".to_string()));
    assert!(!toc.contains(&"Too Deep".to_string()), "default depth is 2: {:?}", toc);
    assert!(toc.contains(&"1".to_string()));
    assert!(toc.contains(&"2".to_string()));
    // Dot leaders run up to the page numbers.
    assert!(toc.iter().any(|t| t.starts_with("....")));
}

#[test]
fn test_outline_points_at_heading_pages() {
    let d = doc(vec![
        section("First", 1, vec![text_para("x")]),
        Block::PageBreak,
        section("Second", 1, vec![section("Nested", 2, vec![])]),
    ]);
    let outline = layout_doc(&d).outline();
    let pages: Vec<(String, usize, u8)> = outline.iter().map(|e| (e.title.clone(), e.page, e.level)).collect();
    assert_eq!(
        pages,
        vec![
            ("First".to_string(), 0, 1),
            ("Second".to_string(), 1, 1),
            ("Nested".to_string(), 1, 2),
        ]
    );
}

#[test]
fn test_heading_is_not_left_alone_at_page_bottom() {
    // Fill the page almost to the bottom, then add a heading.
    let mut blocks: Vec<Block> = (0..29).map(|i| text_para(&format!("Filler {}", i))).collect();
    blocks.push(section("Stranded?", 1, vec![text_para("Follows the heading")]));
    let pass = layout_doc(&doc(blocks));
    let heading_page = pass
        .pages
        .iter()
        .position(|p| texts(p).contains(&"Stranded?".to_string()))
        .unwrap();
    let body_page = pass
        .pages
        .iter()
        .position(|p| texts(p).contains(&"Follows the heading".to_string()))
        .unwrap();
    assert_eq!(heading_page, body_page);
}

// ─── Table Tests ────────────────────────────────────────────────

#[test]
fn test_table_header_repeats_on_every_page() {
    let mut rows = vec![vec![TableCell::Text("Name".to_string()), TableCell::Text("Value".to_string())]];
    for i in 0..120 {
        rows.push(vec![
            TableCell::Text(format!("row {}", i)),
            TableCell::Text(format!("{}", i * 7)),
        ]);
    }
    let d = doc(vec![Block::Table(Table {
        columns: vec![],
        header_rows: 1,
        rows,
        caption: Some("Values".to_string()),
        borders: None,
    })]);
    let pass = layout_doc(&d);
    assert!(pass.pages.len() >= 2);
    for page in &pass.pages {
        assert!(texts(page).contains(&"Name".to_string()), "header missing on a page");
    }
    let placed: usize = pass
        .pages
        .iter()
        .map(|p| texts(p).iter().filter(|t| t.starts_with("row ")).count())
        .sum();
    assert_eq!(placed, 120);
}

#[test]
fn test_table_from_json() {
    let json = r##"{
        "blocks": [{
            "type": "table",
            "columns": ["25%", "75%"],
            "headerRows": 1,
            "rows": [
                ["Key", "Meaning"],
                [{"inlines": [{"type": "strong", "inlines": [{"type": "text", "text": "a"}]}]}, "first"],
                [{"blocks": [{"type": "paragraph", "inlines": [{"type": "text", "text": "nested"}]}]}, "second"]
            ],
            "borders": {"top": {"width": 1, "color": "#000000", "style": "double"}}
        }]
    }"##;
    let bytes = folio::render_json(json).unwrap();
    assert_valid_pdf(&bytes);
}

// ─── Box Tests ──────────────────────────────────────────────────

#[test]
fn test_code_block_moves_whole_to_next_page() {
    let mut blocks: Vec<Block> = (0..27).map(|i| text_para(&format!("Filler {}", i))).collect();
    blocks.push(Block::Code {
        text: (0..12).map(|i| format!("let x{} = {};", i, i)).collect::<Vec<_>>().join("\n"),
        caption: Some("Listing".to_string()),
    });
    let pass = layout_doc(&doc(blocks));
    let first = pass
        .pages
        .iter()
        .position(|p| texts(p).contains(&"let x0 = 0;".to_string()))
        .unwrap();
    let last = pass
        .pages
        .iter()
        .position(|p| texts(p).contains(&"let x11 = 11;".to_string()))
        .unwrap();
    assert_eq!(first, last, "a code block shorter than a page stays on one page");
    assert!(texts(&pass.pages[first]).contains(&"Listing".to_string()));
}

#[test]
fn test_long_sidebar_splits_with_background_on_each_page() {
    let inner = (0..80).map(|i| text_para(&format!("Aside {}", i))).collect();
    let d = doc(vec![Block::Sidebar {
        title: Some("Background".to_string()),
        blocks: inner,
    }]);
    let pass = layout_doc(&d);
    assert!(pass.pages.len() >= 2);
    for page in &pass.pages {
        let fills = count_ops(page, &|op| matches!(op, DrawOp::Fill(_)));
        assert!(fills >= 1, "every page of the sidebar is painted");
    }
}

#[test]
fn test_admonition_draws_label() {
    let d = doc(vec![Block::Admonition {
        label: "note".to_string(),
        blocks: vec![text_para("Remember this.")],
        caption: None,
    }]);
    let pass = layout_doc(&d);
    let page = texts(&pass.pages[0]);
    assert!(page.contains(&"NOTE".to_string()));
    assert!(page.contains(&"Remember this.".to_string()));
}

// ─── Column Tests ───────────────────────────────────────────────

#[test]
fn test_two_column_page_fills_left_then_right() {
    let mut d = doc((0..40).map(|i| text_para(&format!("Item {}", i))).collect());
    d.page.columns = 2;
    let pass = layout_doc(&d);
    let (width, _) = d.page.size.dimensions();
    let mut xs = Vec::new();
    fn collect(calls: &[DrawCall], xs: &mut Vec<(String, f64)>) {
        for call in calls {
            if let DrawOp::DrawText(text) = &call.op {
                if let folio::draw::TextPosition::Absolute(x) = text.at.0 {
                    xs.push((text.text.clone(), x));
                }
            }
            collect(&call.children, xs);
        }
    }
    collect(&pass.pages[0].calls, &mut xs);
    let first = xs.iter().find(|(t, _)| t == "Item 0").unwrap().1;
    let right_column = xs.iter().filter(|(t, x)| t.starts_with("Item") && *x > width / 2.0).count();
    assert!(first < width / 2.0);
    assert!(right_column > 0, "content continues in the right column");
}

// ─── Image and SVG Tests ────────────────────────────────────────

#[test]
fn test_png_image_is_embedded() {
    let d = doc(vec![Block::Image {
        src: png_data_uri(8, 4),
        width: Some(folio::units::Length(200.0)),
        alt: None,
    }]);
    let pass = layout_doc(&d);
    let images = count_ops(&pass.pages[0], &|op| matches!(op, DrawOp::Image { height, .. } if (*height - 100.0).abs() < 1e-6));
    assert_eq!(images, 1);

    let bytes = render_to_pdf(&d);
    assert_valid_pdf(&bytes);
    assert!(String::from_utf8_lossy(&bytes).contains("/Subtype /Image"));
}

#[test]
fn test_missing_image_uses_alt_text() {
    let d = doc(vec![Block::Image {
        src: "./does/not/exist.png".to_string(),
        width: None,
        alt: Some("Architecture diagram".to_string()),
    }]);
    let pass = layout_doc(&d);
    assert!(texts(&pass.pages[0]).contains(&"Architecture diagram".to_string()));
    assert_valid_pdf(&render_to_pdf(&d));
}

#[test]
fn test_svg_block_is_drawn_in_a_bounding_box() {
    let d = doc(vec![Block::Svg {
        content: r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="100" height="50" fill="#ff0000"/></svg>"##.to_string(),
        width: None,
    }]);
    let pass = layout_doc(&d);
    let boxes = count_ops(&pass.pages[0], &|op| {
        matches!(op, DrawOp::BoundingBox { width, height, .. } if (*width - 100.0).abs() < 1e-6 && (*height - 50.0).abs() < 1e-6)
    });
    assert_eq!(boxes, 1);
    assert_valid_pdf(&render_to_pdf(&d));
}

#[test]
fn test_wide_svg_is_scaled_to_the_text_width() {
    let d = doc(vec![Block::Svg {
        content: r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 2000 1000"><circle cx="1000" cy="500" r="400"/></svg>"#.to_string(),
        width: Some(folio::units::Length(2000.0)),
    }]);
    let pass = layout_doc(&d);
    let (width, _) = d.page.size.dimensions();
    let text_width = width - d.page.margin.left - d.page.margin.right;
    let fits = count_ops(&pass.pages[0], &|op| {
        matches!(op, DrawOp::BoundingBox { width, .. } if *width <= text_width + 1e-6)
    });
    assert_eq!(fits, 1);
}

#[test]
fn test_malformed_svg_is_skipped() {
    let d = doc(vec![
        Block::Svg {
            content: "<svg".to_string(),
            width: None,
        },
        text_para("after"),
    ]);
    let pass = layout_doc(&d);
    assert!(texts(&pass.pages[0]).contains(&"after".to_string()));
}

// ─── Cross Reference, Index and Footnote Tests ──────────────────

#[test]
fn test_xref_and_index_from_json() {
    let json = r#"{
        "theme": {"footer": {"enabled": false}},
        "blocks": [
            {"type": "paragraph", "inlines": [
                {"type": "text", "text": "See "},
                {"type": "xref", "target": "details"},
                {"type": "indexTerm", "terms": ["Gadgets", "small"]}
            ]},
            {"type": "pageBreak"},
            {"type": "section", "title": "Details", "id": "details", "blocks": [
                {"type": "paragraph", "inlines": [
                    {"type": "indexTerm", "terms": ["Gadgets", "small"]},
                    {"type": "indexTerm", "terms": ["apples"], "visible": true}
                ]}
            ]},
            {"type": "index"}
        ]
    }"#;
    let d: Document = serde_json::from_str(json).unwrap();
    let pass = layout_doc(&d);
    assert!(texts(&pass.pages[0]).contains(&"See Details (page 2)".to_string()));

    let index: Vec<String> = pass.pages.iter().flat_map(texts).collect();
    assert!(index.contains(&"A".to_string()));
    assert!(index.contains(&"G".to_string()));
    assert!(index.contains(&"apples, 2".to_string()));
    assert!(index.contains(&"Gadgets".to_string()));
    assert!(index.contains(&"small, 1, 2".to_string()));
}

#[test]
fn test_footnotes_are_numbered_in_order() {
    let note = |text: &str| Inline::Footnote {
        inlines: vec![Inline::text(text)],
    };
    let d = doc(vec![
        Block::Paragraph {
            inlines: vec![Inline::text("One"), note("first")],
        },
        Block::Paragraph {
            inlines: vec![Inline::text("Two"), note("second")],
        },
    ]);
    let pass = layout_doc(&d);
    let numbers: Vec<usize> = pass.pagination.registry.footnotes.iter().map(|f| f.number).collect();
    assert_eq!(numbers, vec![1, 2]);
    let page = texts(&pass.pages[0]);
    assert!(page.contains(&"Two[2]".to_string()));
    assert!(page.contains(&"[2] second".to_string()));
}

// ─── Measure Tests ──────────────────────────────────────────────

#[test]
fn test_measure_grows_with_content() {
    let d = doc(vec![]);
    let one = folio::measure(&[text_para("one")], &d).unwrap();
    let three = folio::measure(&[text_para("one"), text_para("two"), text_para("three")], &d).unwrap();
    assert!(one > 0.0);
    assert!(three > one * 2.0);
}

#[test]
fn test_measure_counts_spilled_pages() {
    let d = doc(vec![]);
    let blocks: Vec<Block> = (0..200).map(|i| text_para(&format!("Line {}", i))).collect();
    let height = folio::measure(&blocks, &d).unwrap();
    let (_, page_height) = d.page.size.dimensions();
    assert!(height > page_height);
}

// ─── Font Tests ─────────────────────────────────────────────────

#[test]
fn test_invalid_font_data_is_an_error() {
    let mut d = doc(vec![text_para("x")]);
    d.fonts.push(FontEntry {
        family: "Broken".to_string(),
        src: "not base64!!".to_string(),
        weight: 400,
        italic: false,
    });
    assert!(matches!(folio::render(&d), Err(folio::Error::Font(_))));
}

#[test]
fn test_unknown_family_falls_back_to_base() {
    let mut d = doc(vec![text_para("still renders")]);
    d.theme.heading.font_family = Some("Nonexistent Sans".to_string());
    d.blocks.push(section("Heading", 1, vec![]));
    assert_valid_pdf(&render_to_pdf(&d));
}

// ─── JSON Deserialization Tests ─────────────────────────────────

#[test]
fn test_full_document_from_json() {
    let json = r#"{
        "metadata": {"title": "Manual", "author": "Folio", "lang": "en"},
        "page": {"size": "Letter", "margin": ["1in", "0.75in"]},
        "theme": {"base": {"fontFamily": "Times"}, "code": {"fontFamily": "Courier"}},
        "blocks": [
            {"type": "toc"},
            {"type": "section", "title": "Intro", "blocks": [
                {"type": "paragraph", "inlines": [
                    {"type": "text", "text": "Plain, "},
                    {"type": "emphasis", "inlines": [{"type": "text", "text": "italic"}]},
                    {"type": "text", "text": " and "},
                    {"type": "monospace", "inlines": [{"type": "text", "text": "code"}]}
                ]},
                {"type": "list", "ordered": true, "items": [
                    {"inlines": [{"type": "text", "text": "first"}]},
                    {"inlines": [{"type": "text", "text": "second"}], "blocks": [
                        {"type": "list", "items": [{"inlines": [{"type": "text", "text": "nested"}]}]}
                    ]}
                ]},
                {"type": "rule", "style": "dashed"},
                {"type": "columnBox", "columns": 3, "blocks": [
                    {"type": "paragraph", "inlines": [{"type": "text", "text": "in columns"}]}
                ]}
            ]}
        ]
    }"#;
    let bytes = folio::render_json(json).unwrap();
    assert_valid_pdf(&bytes);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Title (Manual)"));
    assert!(text.contains("/Lang (en)"));
    assert!(text.contains("/MediaBox [0 0 612.00 792.00]"));
}

#[test]
fn test_list_markers() {
    let json = r#"{"blocks": [{"type": "list", "ordered": true, "items": [
        {"inlines": [{"type": "text", "text": "a"}]},
        {"inlines": [{"type": "text", "text": "b"}]}
    ]}, {"type": "list", "items": [{"inlines": [{"type": "text", "text": "c"}]}]}]}"#;
    let d: Document = serde_json::from_str(json).unwrap();
    let page = texts(&layout_doc(&d).pages[0]);
    assert!(page.contains(&"1.".to_string()));
    assert!(page.contains(&"2.".to_string()));
    assert!(page.contains(&"•".to_string()));
}

// ─── Error Handling Tests ───────────────────────────────────────

#[test]
fn test_invalid_json_returns_parse_error() {
    let result = folio::render_json("not valid json {{{");
    let msg = result.unwrap_err().to_string();
    assert!(
        msg.contains("Failed to parse document"),
        "Error should describe parse failure: {}",
        msg
    );
}

#[test]
fn test_unknown_block_type_returns_hint() {
    let result = folio::render_json(r#"{"blocks": [{"type": "carousel"}]}"#);
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("Hint:"), "Error should include hint: {}", msg);
}

#[test]
fn test_empty_json_object_returns_ok() {
    let result = folio::render_json("{}");
    assert!(result.is_ok(), "Empty document should render: {:?}", result.err());
}
