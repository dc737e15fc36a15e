//! The export pipeline: load, read metadata, paginate, persist.

use crate::engine::{CancelToken, Engine, LoadPolicy, PdfLayout, ScopedSession, Session, SessionError};
use crate::error::{ExportError, Result};
use crate::metadata::{DocumentMetadata, METADATA_SCRIPT};
use crate::options::ExportRequest;
use crate::output;
use crate::template::HeaderFooterTemplate;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub output: PathBuf,
    pub byte_size: u64,
}

/// Converts one document into one PDF file per call.
///
/// Every call launches its own session from the engine, so an exporter can
/// be shared between threads when its engine can.
#[derive(Debug, Clone)]
pub struct PdfExporter<E> {
    engine: E,
    policy: LoadPolicy,
}

impl<E: Engine> PdfExporter<E> {
    pub fn new(engine: E) -> Self {
        PdfExporter {
            engine,
            policy: LoadPolicy::default(),
        }
    }

    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn export(&self, request: ExportRequest) -> Result<ExportResult> {
        self.export_with_cancel(request, &CancelToken::new())
    }

    /// Like [`export`](Self::export), but gives up with
    /// [`ExportError::Cancelled`] once `cancel` is triggered. The session is
    /// torn down either way and nothing is written.
    pub fn export_with_cancel(
        &self,
        request: ExportRequest,
        cancel: &CancelToken,
    ) -> Result<ExportResult> {
        let location = request.source.to_string();
        let url = request.source.resolve()?;
        checkpoint(cancel)?;

        info!(
            source = %url,
            output = %request.output.display(),
            format = %request.format,
            margins = %request.margins,
            "Exporting PDF"
        );
        let session = self
            .engine
            .launch()
            .map_err(|err| classify(err, ExportError::ExportFailed))?;
        let mut session = ScopedSession::new(session);

        session
            .load(&url, &self.policy, cancel)
            .map_err(|err| classify(err, |reason| ExportError::unreachable(&location, reason)))?;
        debug!("Document loaded");
        checkpoint(cancel)?;

        let header_footer = if request.header_footer {
            let value = session
                .evaluate(METADATA_SCRIPT)
                .map_err(|err| classify(err, ExportError::ExportFailed))?;
            let metadata = DocumentMetadata::from_script_value(&value, &location)?;
            debug!(title = %metadata.title, author = %metadata.author, "Read document metadata");
            Some(HeaderFooterTemplate::render(&metadata)?)
        } else {
            None
        };

        let layout = PdfLayout {
            format: request.format,
            margins: request.margins,
            print_background: request.print_background,
            header_footer,
        };
        let bytes = session
            .print_to_pdf(&layout)
            .map_err(|err| classify(err, ExportError::ExportFailed))?;
        if bytes.is_empty() {
            return Err(ExportError::ExportFailed(
                "engine returned an empty document".to_string(),
            ));
        }
        checkpoint(cancel)?;

        let byte_size = output::persist(&request.output, &bytes)?;
        info!(byte_size, "Wrote {}", request.output.display());

        Ok(ExportResult {
            output: request.output,
            byte_size,
        })
    }
}

fn checkpoint(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled);
    }
    Ok(())
}

/// Cancellation stays cancellation; anything else becomes the error kind of
/// the step that failed.
fn classify(err: SessionError, otherwise: impl FnOnce(String) -> ExportError) -> ExportError {
    match err {
        SessionError::Cancelled => ExportError::Cancelled,
        err => otherwise(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Length, Margins, SourceLocation};
    use anyhow::anyhow;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use url::Url;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Fault {
        Launch,
        Load,
        Timeout,
        CancelDuringLoad,
        Print,
        EmptyPdf,
    }

    #[derive(Debug, Default)]
    struct Calls {
        launched: usize,
        closed: usize,
        layouts: Vec<PdfLayout>,
    }

    #[derive(Clone)]
    struct FakeEngine {
        calls: Arc<Mutex<Calls>>,
        metadata: serde_json::Value,
        fault: Option<Fault>,
    }

    impl FakeEngine {
        fn new(metadata: &str) -> Self {
            FakeEngine {
                calls: Arc::default(),
                metadata: json!(metadata),
                fault: None,
            }
        }

        fn failing(fault: Fault) -> Self {
            FakeEngine {
                fault: Some(fault),
                ..FakeEngine::new(r#"{"title":"Audit Report","author":"J. Doe"}"#)
            }
        }

        fn launched(&self) -> usize {
            self.calls.lock().unwrap().launched
        }

        fn closed(&self) -> usize {
            self.calls.lock().unwrap().closed
        }

        fn layouts(&self) -> Vec<PdfLayout> {
            self.calls.lock().unwrap().layouts.clone()
        }
    }

    struct FakeSession {
        engine: FakeEngine,
    }

    impl Engine for FakeEngine {
        type Session = FakeSession;

        fn launch(&self) -> std::result::Result<FakeSession, SessionError> {
            if self.fault == Some(Fault::Launch) {
                return Err(anyhow!("Could not auto detect a chrome executable").into());
            }
            self.calls.lock().unwrap().launched += 1;
            Ok(FakeSession {
                engine: self.clone(),
            })
        }
    }

    impl Session for FakeSession {
        fn load(
            &mut self,
            _url: &Url,
            policy: &LoadPolicy,
            cancel: &CancelToken,
        ) -> std::result::Result<(), SessionError> {
            match self.engine.fault {
                Some(Fault::Load) => Err(anyhow!("net::ERR_CONNECTION_REFUSED").into()),
                Some(Fault::Timeout) => Err(SessionError::TimedOut(policy.timeout)),
                Some(Fault::CancelDuringLoad) => {
                    cancel.cancel();
                    Err(SessionError::Cancelled)
                }
                _ => Ok(()),
            }
        }

        fn evaluate(&mut self, expression: &str) -> std::result::Result<serde_json::Value, SessionError> {
            assert_eq!(expression, METADATA_SCRIPT);
            Ok(self.engine.metadata.clone())
        }

        fn print_to_pdf(&mut self, layout: &PdfLayout) -> std::result::Result<Vec<u8>, SessionError> {
            self.engine.calls.lock().unwrap().layouts.push(layout.clone());
            match self.engine.fault {
                Some(Fault::Print) => Err(anyhow!("Printing failed").into()),
                Some(Fault::EmptyPdf) => Ok(Vec::new()),
                _ => Ok(format!("%PDF-1.7\n{layout:?}\n%%EOF").into_bytes()),
            }
        }

        fn close(&mut self) {
            self.engine.calls.lock().unwrap().closed += 1;
        }
    }

    fn write_source(dir: &Path) -> SourceLocation {
        let path = dir.join("report.html");
        fs::write(
            &path,
            r#"<title>Audit Report</title><meta name="author" content="J. Doe">"#,
        )
        .unwrap();
        SourceLocation::Path(path)
    }

    fn request(dir: &Path, header_footer: bool) -> ExportRequest {
        let mut request = ExportRequest::new(write_source(dir), dir.join("report.pdf"));
        request.header_footer = header_footer;
        request
    }

    #[test]
    fn test_export_without_header_footer() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);

        let result = PdfExporter::new(engine.clone())
            .export(request(tempdir.path(), false))
            .unwrap();

        assert_eq!(result.output, tempdir.path().join("report.pdf"));
        assert!(result.byte_size > 0);
        assert_eq!(fs::metadata(&result.output).unwrap().len(), result.byte_size);

        let layouts = engine.layouts();
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].header_footer, None);
        assert!(layouts[0].print_background);
        assert_eq!((engine.launched(), engine.closed()), (1, 1));
    }

    #[test]
    fn test_export_with_header_footer() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report","author":"J. Doe"}"#);

        PdfExporter::new(engine.clone())
            .export(request(tempdir.path(), true))
            .unwrap();

        let layouts = engine.layouts();
        let template = layouts[0].header_footer.as_ref().unwrap();
        assert!(template
            .header()
            .contains(r#"<span class="report-title">Audit Report</span>"#));
        assert!(template
            .header()
            .contains(r#"<span class="report-author">J. Doe</span>"#));
        assert!(template.footer().contains(
            r#"<span class="pageNumber"></span> of <span class="totalPages"></span>"#
        ));
    }

    #[test]
    fn test_missing_author_renders_empty() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);

        PdfExporter::new(engine.clone())
            .export(request(tempdir.path(), true))
            .unwrap();

        let template = engine.layouts()[0].header_footer.clone().unwrap();
        assert!(template
            .header()
            .contains(r#"<span class="report-author"></span>"#));
    }

    #[test]
    fn test_missing_title_leaves_output_untouched() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"author":"J. Doe"}"#);
        let request = request(tempdir.path(), true);
        fs::write(&request.output, "previous export").unwrap();

        let err = PdfExporter::new(engine.clone()).export(request).unwrap_err();

        assert!(matches!(err, ExportError::MetadataMissing { field: "title", .. }));
        assert_eq!(
            fs::read_to_string(tempdir.path().join("report.pdf")).unwrap(),
            "previous export"
        );
        assert!(engine.layouts().is_empty());
        assert_eq!(engine.closed(), 1);
    }

    #[test]
    fn test_missing_title_ignored_without_header_footer() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{}"#);

        let result = PdfExporter::new(engine).export(request(tempdir.path(), false));
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_source_never_launches() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);
        let request = ExportRequest::new(
            SourceLocation::Path(tempdir.path().join("nope.html")),
            tempdir.path().join("report.pdf"),
        );

        let err = PdfExporter::new(engine.clone()).export(request).unwrap_err();

        assert!(matches!(err, ExportError::SourceUnreachable { .. }));
        assert_eq!(engine.launched(), 0);
        assert!(!tempdir.path().join("report.pdf").exists());
    }

    #[test]
    fn test_load_failures_are_source_unreachable() {
        for fault in [Fault::Load, Fault::Timeout] {
            let tempdir = tempfile::tempdir().unwrap();
            let engine = FakeEngine::failing(fault);

            let err = PdfExporter::new(engine.clone())
                .export(request(tempdir.path(), true))
                .unwrap_err();

            assert!(
                matches!(err, ExportError::SourceUnreachable { .. }),
                "{fault:?}: {err}"
            );
            assert_eq!(engine.closed(), 1);
            assert!(!tempdir.path().join("report.pdf").exists());
        }
    }

    #[test]
    fn test_engine_failures_are_export_failed() {
        for fault in [Fault::Launch, Fault::Print, Fault::EmptyPdf] {
            let tempdir = tempfile::tempdir().unwrap();
            let engine = FakeEngine::failing(fault);

            let err = PdfExporter::new(engine.clone())
                .export(request(tempdir.path(), false))
                .unwrap_err();

            assert!(matches!(err, ExportError::ExportFailed(_)), "{fault:?}: {err}");
            assert_eq!(engine.launched(), engine.closed());
            assert!(!tempdir.path().join("report.pdf").exists());
        }
    }

    #[test]
    fn test_unwritable_output() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);
        let mut request = request(tempdir.path(), false);
        request.output = tempdir.path().join("missing").join("report.pdf");

        let err = PdfExporter::new(engine.clone()).export(request).unwrap_err();

        assert!(matches!(err, ExportError::OutputWriteFailed { .. }));
        assert_eq!(engine.closed(), 1);
    }

    #[test]
    fn test_repeat_export_overwrites() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report","author":"J. Doe"}"#);
        let exporter = PdfExporter::new(engine);
        let output = tempdir.path().join("report.pdf");

        // The header/footer export is the larger one.
        exporter.export(request(tempdir.path(), true)).unwrap();
        let long = fs::read(&output).unwrap();

        exporter.export(request(tempdir.path(), false)).unwrap();
        let first = fs::read(&output).unwrap();
        assert!(first.len() < long.len());

        let result = exporter.export(request(tempdir.path(), false)).unwrap();
        let second = fs::read(&output).unwrap();
        assert_eq!(first, second);
        assert_eq!(result.byte_size, second.len() as u64);
    }

    #[test]
    fn test_margins_passed_through() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);
        let mut request = request(tempdir.path(), false);
        request.margins = "75px".parse().unwrap();

        PdfExporter::new(engine.clone()).export(request).unwrap();

        let margins = engine.layouts()[0].margins;
        assert_eq!(margins, Margins::uniform(Length::px(75)));
        for side in [margins.top, margins.right, margins.bottom, margins.left] {
            assert_eq!(side.to_inches(), 0.78125);
        }
    }

    #[test]
    fn test_cancel_before_start() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(r#"{"title":"Audit Report"}"#);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = PdfExporter::new(engine.clone())
            .export_with_cancel(request(tempdir.path(), false), &cancel)
            .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled));
        assert_eq!(engine.launched(), 0);
    }

    #[test]
    fn test_cancel_during_load_tears_down() {
        let tempdir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::failing(Fault::CancelDuringLoad);

        let err = PdfExporter::new(engine.clone())
            .export_with_cancel(request(tempdir.path(), false), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled));
        assert_eq!((engine.launched(), engine.closed()), (1, 1));
        assert!(!tempdir.path().join("report.pdf").exists());
    }
}
