//! Text extraction from uploaded documents, one strategy per media type.
use std::collections::HashMap;

/// Result of running an extractor over a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Text taken from the document itself
    Text(String),
    /// Text could not be read locally, but the model can read the file directly
    Placeholder(String),
    /// No extractor is registered for the media type
    Unsupported,
}

impl Extraction {
    pub fn has_text(&self) -> bool {
        !matches!(self, Extraction::Unsupported)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::Text(text) | Extraction::Placeholder(text) => Some(text),
            Extraction::Unsupported => None,
        }
    }
}

pub trait Extractor: Send + Sync {
    fn extract(&self, name: &str, data: &[u8]) -> Extraction;
}

/// Decodes the bytes as UTF-8, replacing invalid sequences
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, _name: &str, data: &[u8]) -> Extraction {
        Extraction::Text(String::from_utf8_lossy(data).into_owned())
    }
}

/// Stands in for formats only the model can read (PDF, Word, images)
pub struct PlaceholderExtractor {
    kind: &'static str,
}

impl PlaceholderExtractor {
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl Extractor for PlaceholderExtractor {
    fn extract(&self, name: &str, data: &[u8]) -> Extraction {
        Extraction::Placeholder(format!(
            "[{} content from {} ({} bytes)]",
            self.kind,
            name,
            data.len()
        ))
    }
}

pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    pub fn register<S: Into<String>>(&mut self, mime_type: S, extractor: Box<dyn Extractor>) {
        self.extractors
            .insert(mime_type.into().to_ascii_lowercase(), extractor);
    }

    pub fn extract(&self, mime_type: &str, name: &str, data: &[u8]) -> Extraction {
        // parameters such as "; charset=utf-8" do not pick the extractor
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match self.extractors.get(&essence) {
            Some(extractor) => extractor.extract(name, data),
            None => Extraction::Unsupported,
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("text/plain", Box::new(PlainTextExtractor));
        registry.register("application/pdf", Box::new(PlaceholderExtractor::new("PDF")));
        registry.register(
            "application/msword",
            Box::new(PlaceholderExtractor::new("Word document")),
        );
        registry.register(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Box::new(PlaceholderExtractor::new("Word document")),
        );
        registry.register("image/jpeg", Box::new(PlaceholderExtractor::new("Image")));
        registry.register("image/png", Box::new(PlaceholderExtractor::new("Image")));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let registry = ExtractorRegistry::default();
        let extraction = registry.extract("text/plain; charset=utf-8", "notes.txt", b"Rent is due monthly");
        assert_eq!(extraction, Extraction::Text("Rent is due monthly".into()));
        assert!(extraction.has_text());
    }

    #[test]
    fn test_pdf_gets_placeholder() {
        let registry = ExtractorRegistry::default();
        let extraction = registry.extract("application/pdf", "lease.pdf", &[0u8; 2048]);
        assert!(extraction.has_text());
        assert_eq!(
            extraction.text(),
            Some("[PDF content from lease.pdf (2048 bytes)]")
        );
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let registry = ExtractorRegistry::default();
        let extraction = registry.extract("application/zip", "archive.zip", b"PK");
        assert_eq!(extraction, Extraction::Unsupported);
        assert!(!extraction.has_text());
        assert_eq!(extraction.text(), None);
    }

    #[test]
    fn test_custom_registration() {
        struct Upper;
        impl Extractor for Upper {
            fn extract(&self, _name: &str, data: &[u8]) -> Extraction {
                Extraction::Text(String::from_utf8_lossy(data).to_uppercase())
            }
        }
        let mut registry = ExtractorRegistry::empty();
        registry.register("Text/Markdown", Box::new(Upper));
        assert_eq!(
            registry.extract("text/markdown", "a.md", b"deed"),
            Extraction::Text("DEED".into())
        );
    }
}
