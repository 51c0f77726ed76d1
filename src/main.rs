//! # Folio CLI
//!
//! Usage:
//!   folio proposal.html -o paginated.html
//!   cat proposal.html | folio -o paginated.html --report
//!   folio proposal.html -o paginated.html --pdf proposal.pdf --endpoint http://localhost:3000/render
//!   folio --example > proposal.html

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use folio::{paginate_html, BlockLayoutConfig, FolioError, PaginationConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Repaginate a styled HTML proposal into printable pages")]
struct Args {
    /// Input HTML file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Where to write the paginated HTML.
    #[arg(short, long, default_value = "paginated.html")]
    output: PathBuf,

    /// Pagination settings as JSON. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Height of a page without an explicit height, in CSS pixels.
    #[arg(long)]
    page_height: Option<f64>,

    /// Print the pagination report as JSON on stdout.
    #[arg(long)]
    report: bool,

    /// Also render a PDF through the conversion service.
    #[arg(long, requires = "endpoint")]
    pdf: Option<PathBuf>,

    /// URL of the HTML-to-PDF conversion service.
    #[arg(long)]
    endpoint: Option<String>,

    /// Print a sample proposal and exit.
    #[arg(long)]
    example: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.example {
        print!("{}", example_proposal_html());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), FolioError> {
    let input = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let config = match &args.config {
        Some(path) => PaginationConfig::from_json(&fs::read_to_string(path)?)?,
        None => PaginationConfig::default(),
    };
    let mut layout = BlockLayoutConfig::default();
    if let Some(h) = args.page_height {
        layout.page_height = h;
    }

    let paginated = paginate_html(&input, layout, &config)?;
    fs::write(&args.output, &paginated.html)?;
    eprintln!(
        "✓ {} page(s) written to {}",
        paginated.report.pages,
        args.output.display()
    );
    if paginated.report.overflowing_pages > 0 {
        eprintln!("! {} page(s) still overflow", paginated.report.overflowing_pages);
    }

    if args.report {
        let json = serde_json::to_string_pretty(&paginated.report)?;
        println!("{json}");
    }

    if let (Some(pdf_path), Some(endpoint)) = (&args.pdf, &args.endpoint) {
        render_pdf(&paginated.html, endpoint, pdf_path)?;
    }
    Ok(())
}

#[cfg(feature = "http")]
fn render_pdf(html: &str, endpoint: &str, path: &std::path::Path) -> Result<(), FolioError> {
    use folio::export::{HttpBackend, RenderBackend, RenderOptions, RenderRequest};

    let backend = HttpBackend::new(endpoint)?;
    let pdf = backend.render(&RenderRequest::new(html, RenderOptions::default()))?;
    fs::write(path, &pdf)?;
    eprintln!("✓ Written {} bytes to {}", pdf.len(), path.display());
    Ok(())
}

#[cfg(not(feature = "http"))]
fn render_pdf(_html: &str, _endpoint: &str, _path: &std::path::Path) -> Result<(), FolioError> {
    Err(FolioError::Surface(
        "PDF output needs folio built with the `http` feature".to_string(),
    ))
}

fn example_proposal_html() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head><title>Proposal</title></head>
<body>
<div class="page cover">
  <div class="page-body"><h1>Platform Modernization Proposal</h1><p>Prepared for Acme Corp</p></div>
</div>
<div class="page toc">
  <div class="page-header" style="height: 60px">Acme Corp</div>
  <div class="page-body">
    <h1 class="toc-title">Table of Contents</h1>
    <ol class="toc-list"></ol>
  </div>
  <div class="page-footer" style="height: 40px">Page <span class="page-number"></span> of <span class="page-total"></span></div>
</div>
<div class="page">
  <div class="page-header" style="height: 60px">Acme Corp</div>
  <div class="page-body">
    <h2>Executive Summary</h2>
    <p>Acme runs its order pipeline on a monolith that has outgrown its hosting. This proposal moves it onto managed services in three phases, each independently shippable.</p>
    <h2>Scope</h2>
    <h3>Assessment</h3>
    <p>Two weeks of interviews and code review to map every integration.</p>
    <h3>Migration</h3>
    <div class="component-layout" style="height: 420px"><img src="architecture.png" height="380"><p>Target architecture</p></div>
    <h3>Hand-over</h3>
    <p>Runbooks, training and a four-week hypercare period.</p>
    <div class="page-break"></div>
    <h2>Proposed Pricing</h2>
    <table><tr><th>Phase</th><th>Fee</th></tr><tr><td>Assessment</td><td>$24,000</td></tr><tr><td>Migration</td><td>$180,000</td></tr></table>
  </div>
  <div class="page-footer" style="height: 40px">Page <span class="page-number"></span> of <span class="page-total"></span></div>
</div>
</body>
</html>
"##
}
