//! # Folio CLI
//!
//! Usage:
//!   folio input.json -o output.pdf
//!   echo '{ ... }' | folio -o output.pdf
//!   folio --example > book.json
//!
//! Set `RUST_LOG=folio=debug` for layout diagnostics.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_book_json());
        return;
    }

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1]).map_err(|e| format!("cannot read {}: {}", args[1], e))
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map(|_| buf)
            .map_err(|e| format!("cannot read stdin: {}", e))
    };
    let input = input.unwrap_or_else(|e| fail(&e));

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "output.pdf".to_string());

    match folio::render_json(&input) {
        Ok(pdf_bytes) => {
            if let Err(e) = fs::write(&output_path, &pdf_bytes) {
                fail(&format!("cannot write {}: {}", output_path, e));
            }
            eprintln!("✓ Written {} bytes to {}", pdf_bytes.len(), output_path);
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("✗ {}", message);
    process::exit(1);
}

fn example_book_json() -> &'static str {
    r##"{
  "metadata": {
    "title": "Field Guide",
    "author": "Folio"
  },
  "page": {
    "size": "A5",
    "margin": ["0.75in", "0.6in"]
  },
  "theme": {
    "base": { "fontFamily": "Times", "fontSize": 10.5 },
    "footer": { "template": "{page} / {total}" }
  },
  "blocks": [
    { "type": "toc" },
    {
      "type": "section",
      "title": "Getting Started",
      "blocks": [
        {
          "type": "paragraph",
          "inlines": [
            { "type": "text", "text": "Folio lays out " },
            { "type": "strong", "inlines": [{ "type": "text", "text": "structured documents" }] },
            { "type": "text", "text": " page by page." },
            { "type": "indexTerm", "terms": ["layout"] },
            { "type": "footnote", "inlines": [{ "type": "text", "text": "Pages are never sliced after the fact." }] }
          ]
        },
        {
          "type": "admonition",
          "label": "tip",
          "blocks": [{ "type": "paragraph", "inlines": [{ "type": "text", "text": "See the reference chapter for every block type." }] }]
        },
        {
          "type": "code",
          "caption": "Rendering from the shell",
          "text": "folio book.json -o book.pdf\n"
        }
      ]
    },
    {
      "type": "section",
      "title": "Reference",
      "blocks": [
        {
          "type": "table",
          "columns": ["30%", "auto"],
          "headerRows": 1,
          "rows": [
            ["Block", "Purpose"],
            ["paragraph", "Wrapped text"],
            ["code", "Preformatted text in a box"],
            ["svg", "Vector artwork"]
          ]
        },
        {
          "type": "svg",
          "width": 120,
          "content": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 100 50'><rect x='5' y='5' width='90' height='40' rx='6' fill='#3b82f6'/></svg>"
        },
        {
          "type": "paragraph",
          "inlines": [
            { "type": "text", "text": "Back to " },
            { "type": "xref", "target": "_getting_started" },
            { "type": "text", "text": "." },
            { "type": "indexTerm", "terms": ["layout", "tables"] }
          ]
        }
      ]
    },
    { "type": "index" }
  ]
}
"##
}
