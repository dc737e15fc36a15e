use report_pdf::{
    ChromeEngine, ExportRequest, LoadPolicy, Margins, PageFormat, PdfExporter, SourceLocation,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Export an HTML report to PDF with headless Chrome
#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Options {
    /// HTML file path or URL to export
    input: SourceLocation,
    /// Where to write the PDF; an existing file is replaced
    #[arg(long, short)]
    output: PathBuf,
    /// Paper size (Letter, Legal, Tabloid, Ledger, A0-A6)
    #[arg(long, default_value = "A4")]
    format: PageFormat,
    /// Page margins in CSS shorthand, e.g. "75px" or "10mm 15mm"
    #[arg(long, default_value = "20px")]
    margin: Margins,
    /// Leave out background colors and images
    #[arg(long)]
    no_background: bool,
    /// Print the document title and author in a header and page numbers in a footer
    #[arg(long)]
    header_footer: bool,
    /// Chrome or Chromium executable (searched for when omitted)
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,
    /// Launch the browser without its sandbox
    #[arg(long)]
    no_sandbox: bool,
    /// Seconds to wait for the document to load and its network to go idle
    #[arg(long, default_value = "30")]
    timeout: u64,
}

impl Options {
    fn request(&self) -> ExportRequest {
        let mut request = ExportRequest::new(self.input.clone(), &self.output);
        request.format = self.format;
        request.margins = self.margin;
        request.print_background = !self.no_background;
        request.header_footer = self.header_footer;
        request
    }

    fn engine(&self) -> ChromeEngine {
        let engine = ChromeEngine::default().sandbox(!self.no_sandbox);
        match &self.chrome {
            Some(path) => engine.executable(path),
            None => engine,
        }
    }

    fn load_policy(&self) -> LoadPolicy {
        LoadPolicy {
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let opts: Options = clap::Parser::parse();
    let exporter = PdfExporter::new(opts.engine()).load_policy(opts.load_policy());
    let result = exporter.export(opts.request())?;

    println!("{}", result.output.display());
    Ok(())
}
