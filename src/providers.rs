//! External collaborator contracts
//!
//! Text extraction and symmetric encryption are supplied from outside the
//! lifecycle core (OCR services, crypto libraries); only their contracts
//! live here, plus a plain-text extractor so submission works with no
//! external provider wired in.

use crate::error::Result;
use tracing::warn;

/// Best-effort result of text extraction from a raw submission.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Free-text publication date; the rights sweeper reads the leading
    /// 4-digit year.
    pub publication_date: Option<String>,
    pub public_domain_guess: bool,
    pub body: String,
}

/// Extracts text and metadata from raw submitted bytes.
///
/// Infallible by contract: implementations fold their failures into a
/// partial [`Extraction`] with an explanatory placeholder body, so a
/// submission never fails purely because extraction had trouble.
pub trait TextExtractionProvider {
    fn extract(&self, raw: &[u8]) -> Extraction;
}

/// Built-in extractor: treats the submission as UTF-8 text.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractionProvider for PlainTextExtractor {
    fn extract(&self, raw: &[u8]) -> Extraction {
        match std::str::from_utf8(raw) {
            Ok(text) => Extraction {
                body: text.to_string(),
                ..Extraction::default()
            },
            Err(e) => {
                warn!(error = %e, "Submission is not UTF-8, storing placeholder body");
                Extraction {
                    body: format!("[extraction failed: {e}]"),
                    ..Extraction::default()
                }
            }
        }
    }
}

/// Symmetric encryption of loaned work bodies under a borrower's key.
///
/// No algorithm is mandated; key or format mismatches surface as
/// `LibraryError::Crypto`.
pub trait EncryptionProvider {
    fn encrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>>;
}
