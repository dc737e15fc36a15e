//! Page header and footer markup handed to the print engine.
//!
//! The engine renders these fragments itself on every page and fills in the
//! `pageNumber` and `totalPages` spans.

use crate::error::{ExportError, Result};
use crate::metadata::DocumentMetadata;
use minijinja::{context, Environment};

const HEADER: &str = include_str!("../assets/header.html");
const FOOTER: &str = include_str!("../assets/footer.html");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFooterTemplate {
    header: String,
    footer: String,
}

impl HeaderFooterTemplate {
    /// Renders title (left) and author (right) into the header. Both are
    /// HTML-escaped since the templates are named `.html`.
    pub fn render(metadata: &DocumentMetadata) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("header.html", HEADER).map_err(template_error)?;
        env.add_template("footer.html", FOOTER).map_err(template_error)?;

        let header = env
            .get_template("header.html")
            .and_then(|template| {
                template.render(context! {
                    title => &metadata.title,
                    author => &metadata.author,
                })
            })
            .map_err(template_error)?;
        let footer = env
            .get_template("footer.html")
            .and_then(|template| template.render(context! {}))
            .map_err(template_error)?;

        Ok(HeaderFooterTemplate { header, footer })
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }
}

fn template_error(err: minijinja::Error) -> ExportError {
    ExportError::ExportFailed(format!("header/footer template: {err}"))
}
