//! Export HTML reports to paginated PDF files through a headless browser.
//!
//! The pipeline loads a document into a rendering session, optionally reads
//! its title and author to build a page header and footer, prints it to PDF
//! and writes the result atomically to disk.
//!
//! ```no_run
//! use report_pdf::{ChromeEngine, ExportRequest, PdfExporter};
//!
//! let mut request = ExportRequest::new("report.html".parse()?, "report.pdf");
//! request.header_footer = true;
//!
//! let result = PdfExporter::new(ChromeEngine::default()).export(request)?;
//! println!("wrote {} bytes", result.byte_size);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chrome;
pub mod engine;
pub mod error;
pub mod export;
pub mod metadata;
pub mod options;
pub mod output;
pub mod template;

pub use chrome::ChromeEngine;
pub use engine::{CancelToken, Engine, LoadPolicy, PdfLayout, Session, SessionError};
pub use error::{ExportError, Result};
pub use export::{ExportResult, PdfExporter};
pub use metadata::DocumentMetadata;
pub use options::{ExportRequest, Length, LengthUnit, Margins, PageFormat, ParseError, SourceLocation};
pub use template::HeaderFooterTemplate;
