//! `undoc` command line: extract document content as Markdown or
//! JSON, inspect metadata, or dump parse diagnostics.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use undoc::render::{self, JsonFormat, RenderOptions};
use undoc::{parse_file_with, Block, Document, ParseOptions};

#[derive(Parser, Debug)]
#[command(
    name = "undoc",
    version,
    about = "Extract text, tables and structure from PDF/DOCX/PPTX/XLSX/HWPX documents"
)]
struct Cli {
    /// Input document
    path: PathBuf,

    /// Output Markdown (the default)
    #[arg(long, visible_alias = "md")]
    markdown: bool,

    /// Output JSON
    #[arg(long, conflicts_with = "markdown")]
    json: bool,

    /// Embed image bytes (base64) in JSON output
    #[arg(long, requires = "json")]
    include_images: bool,

    /// Output only the detected tables
    #[arg(long)]
    tables: bool,

    /// Print parse diagnostics instead of content
    #[arg(long)]
    analyze: bool,

    /// Print document metadata instead of content
    #[arg(long)]
    info: bool,

    /// Write to a file instead of standard output
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> undoc::Result<()> {
    let options = ParseOptions {
        include_images: cli.include_images,
        ..ParseOptions::default()
    };
    let document = parse_file_with(&cli.path, &options)?;

    let output = if cli.info {
        render_info(&document)
    } else if cli.analyze {
        render_diagnostics(&document)
    } else if cli.tables {
        render_tables(&document)
    } else if cli.json {
        render::to_json(&document, JsonFormat::Pretty)?
    } else {
        render::to_markdown(&document, &RenderOptions::default())
    };

    match &cli.output {
        Some(path) => fs::write(path, output)?,
        None => println!("{output}"),
    }
    Ok(())
}

fn render_info(document: &Document) -> String {
    let meta = &document.metadata;
    let mut lines = vec![
        format!("format:     {}", meta.format),
        format!("pages:      {}", document.page_count()),
    ];
    if let Some(v) = &meta.version {
        lines.push(format!("version:    {v}"));
    }
    let field = |label: &str, value: &Option<String>| {
        value.as_ref().map(|v| format!("{label} {v}"))
    };
    lines.extend(field("title:     ", &meta.title));
    lines.extend(field("author:    ", &meta.author));
    lines.extend(field("subject:   ", &meta.subject));
    lines.extend(field("creator:   ", &meta.creator));
    lines.extend(field("producer:  ", &meta.producer));
    if let Some(d) = &meta.created {
        lines.push(format!("created:    {d}"));
    }
    if let Some(d) = &meta.modified {
        lines.push(format!("modified:   {d}"));
    }
    lines.push(format!("tables:     {}", document.tables().len()));
    lines.push(format!("images:     {}", document.image_count()));
    lines.push(format!("diagnostics: {}", document.diagnostics.len()));
    lines.join("\n")
}

fn render_diagnostics(document: &Document) -> String {
    if document.diagnostics.is_empty() {
        return "no diagnostics; document parsed cleanly".to_string();
    }
    document
        .diagnostics
        .iter()
        .map(|d| match d.page {
            Some(p) => format!("[page {p}] {:?}: {}", d.kind, d.message),
            None => format!("{:?}: {}", d.kind, d.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_tables(document: &Document) -> String {
    let mut out = Vec::new();
    for page in &document.pages {
        for block in &page.blocks {
            if let Block::Table(table) = block {
                let doc = single_table_doc(page.number, table.clone());
                out.push(render::to_markdown(&doc, &RenderOptions::default()));
            }
        }
    }
    if out.is_empty() {
        "no tables detected".to_string()
    } else {
        out.join("\n")
    }
}

fn single_table_doc(page_number: u32, table: undoc::Table) -> Document {
    let mut page = undoc::Page::letter(page_number);
    page.add_block(Block::Table(table));
    let mut doc = Document::new(undoc::Metadata::default());
    doc.add_page(page);
    doc
}
