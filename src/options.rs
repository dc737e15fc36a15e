//! Export request and the layout values it carries

use crate::error::{ExportError, Result};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Errors from parsing option values such as `A4` or `10mm 20mm`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown page format `{0}`")]
    UnknownFormat(String),

    #[error("Invalid length `{0}`")]
    InvalidLength(String),

    #[error("Unknown length unit `{0}` (expected px, in, cm, mm or pt)")]
    UnknownUnit(String),

    #[error("Expected 1 to 4 margin values, got {0}")]
    MarginCount(usize),

    #[error("Source location is empty")]
    EmptySource,
}

/// One export, constructed per invocation and consumed by [`crate::PdfExporter::export`].
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: SourceLocation,
    pub output: PathBuf,
    pub format: PageFormat,
    pub margins: Margins,
    pub print_background: bool,
    pub header_footer: bool,
}

impl ExportRequest {
    /// A request with the default layout: A4, 20px margins, backgrounds on,
    /// no header or footer.
    pub fn new(source: SourceLocation, output: impl Into<PathBuf>) -> Self {
        ExportRequest {
            source,
            output: output.into(),
            format: PageFormat::default(),
            margins: Margins::default(),
            print_background: true,
            header_footer: false,
        }
    }
}

/// Where the document to export lives.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(Url),
}

impl SourceLocation {
    /// Turns the location into a URL the engine can navigate to.
    ///
    /// Local files are checked here so that a missing report fails before a
    /// browser is ever launched.
    pub fn resolve(&self) -> Result<Url> {
        match self {
            SourceLocation::Path(path) => {
                let absolute = fs::canonicalize(path)
                    .map_err(|err| ExportError::unreachable(self.to_string(), err.to_string()))?;
                if !absolute.is_file() {
                    return Err(ExportError::unreachable(self.to_string(), "no such file"));
                }
                Url::from_file_path(&absolute).map_err(|_| {
                    ExportError::unreachable(self.to_string(), "cannot be expressed as a file URL")
                })
            }
            SourceLocation::Url(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ExportError::unreachable(url.as_str(), "not a local file URL"))?;
                if !path.is_file() {
                    return Err(ExportError::unreachable(url.as_str(), "no such file"));
                }
                Ok(url.clone())
            }
            SourceLocation::Url(url) => Ok(url.clone()),
        }
    }
}

impl FromStr for SourceLocation {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::EmptySource);
        }

        // Anything else that parses as a URL (`C:\reports\a.html`) is a path.
        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file" | "data") => {
                Ok(SourceLocation::Url(url))
            }
            _ => Ok(SourceLocation::Path(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
            SourceLocation::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Paper sizes understood by the print engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
}

impl PageFormat {
    /// Portrait paper size as (width, height) in inches.
    pub fn size_in_inches(self) -> (f64, f64) {
        match self {
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
            PageFormat::Tabloid => (11.0, 17.0),
            PageFormat::Ledger => (17.0, 11.0),
            PageFormat::A0 => (33.1, 46.8),
            PageFormat::A1 => (23.4, 33.1),
            PageFormat::A2 => (16.54, 23.4),
            PageFormat::A3 => (11.7, 16.54),
            PageFormat::A4 => (8.27, 11.7),
            PageFormat::A5 => (5.83, 8.27),
            PageFormat::A6 => (4.13, 5.83),
        }
    }
}

impl FromStr for PageFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => PageFormat::Letter,
            "legal" => PageFormat::Legal,
            "tabloid" => PageFormat::Tabloid,
            "ledger" => PageFormat::Ledger,
            "a0" => PageFormat::A0,
            "a1" => PageFormat::A1,
            "a2" => PageFormat::A2,
            "a3" => PageFormat::A3,
            "a4" => PageFormat::A4,
            "a5" => PageFormat::A5,
            "a6" => PageFormat::A6,
            _ => return Err(ParseError::UnknownFormat(s.to_string())),
        };
        Ok(format)
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
    Pt,
}

impl LengthUnit {
    fn per_inch(self) -> f64 {
        match self {
            LengthUnit::Px => 96.0,
            LengthUnit::In => 1.0,
            LengthUnit::Cm => 2.54,
            LengthUnit::Mm => 25.4,
            LengthUnit::Pt => 72.0,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::Pt => "pt",
        }
    }
}

/// A non-negative CSS-style length such as `75px` or `1.5cm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    value: f64,
    unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> std::result::Result<Self, ParseError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ParseError::InvalidLength(format!("{value}{}", unit.suffix())));
        }
        Ok(Length { value, unit })
    }

    /// Whole pixels, which can never be negative.
    pub fn px(value: u32) -> Self {
        Length {
            value: f64::from(value),
            unit: LengthUnit::Px,
        }
    }

    pub fn to_inches(&self) -> f64 {
        self.value / self.unit.per_inch()
    }
}

impl FromStr for Length {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        // The unit is the trailing run of letters, so `1e1px` keeps its exponent.
        let split = s.trim_end_matches(|c: char| c.is_ascii_alphabetic()).len();
        let (number, suffix) = s.split_at(split);

        let value = number
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidLength(s.to_string()))?;

        let unit = match suffix.to_ascii_lowercase().as_str() {
            "" | "px" => LengthUnit::Px,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            "pt" => LengthUnit::Pt,
            other => return Err(ParseError::UnknownUnit(other.to_string())),
        };

        Length::new(value, unit).map_err(|_| ParseError::InvalidLength(s.to_string()))
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Margins {
    pub fn uniform(length: Length) -> Self {
        Margins {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::uniform(Length::px(20))
    }
}

/// Parses CSS `margin` shorthand: `top [right [bottom [left]]]`.
impl FromStr for Margins {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse::<Length>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let margins = match values.as_slice() {
            [all] => Margins::uniform(*all),
            [vertical, horizontal] => Margins {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            },
            [top, horizontal, bottom] => Margins {
                top: *top,
                right: *horizontal,
                bottom: *bottom,
                left: *horizontal,
            },
            [top, right, bottom, left] => Margins {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            },
            _ => return Err(ParseError::MarginCount(values.len())),
        };
        Ok(margins)
    }
}

impl fmt::Display for Margins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}
