//! Where a draft's archive is fetched from.

use crate::task::TaskId;

/// Placeholder replaced by the draft id in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("archive URL template must contain {{id}}: {0}")]
    MissingPlaceholder(String),
    #[error("invalid archive URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),
}

/// Resolves a draft id to the URL its archive is served from.
pub trait ArchiveSource: Send + Sync {
    fn archive_url(&self, id: &TaskId) -> Result<String, SourceError>;
}

/// Substitutes the id into a configured URL template,
/// e.g. `https://api.example.com/drafts/{id}/archive`.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    template: String,
}

impl TemplateSource {
    /// Validates the template once up front so per-task resolution cannot fail on it.
    pub fn new(template: impl Into<String>) -> Result<Self, SourceError> {
        let template = template.into();
        if !template.contains(ID_PLACEHOLDER) {
            return Err(SourceError::MissingPlaceholder(template));
        }
        resolve(&template, "sample")?;
        Ok(TemplateSource { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl ArchiveSource for TemplateSource {
    fn archive_url(&self, id: &TaskId) -> Result<String, SourceError> {
        resolve(&self.template, id.as_str())
    }
}

fn resolve(template: &str, id: &str) -> Result<String, SourceError> {
    let url = template.replace(ID_PLACEHOLDER, id);
    let parsed = url::Url::parse(&url).map_err(|source| SourceError::InvalidUrl {
        url: url.clone(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.into()),
        other => Err(SourceError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_id() {
        let source = TemplateSource::new("https://api.example.com/drafts/{id}/archive").unwrap();
        let id = TaskId::parse("abc-123").unwrap();
        assert_eq!(
            source.archive_url(&id).unwrap(),
            "https://api.example.com/drafts/abc-123/archive"
        );
    }

    #[test]
    fn placeholder_in_query() {
        let source = TemplateSource::new("http://127.0.0.1:8080/download?draft={id}").unwrap();
        let id = TaskId::parse("x.1").unwrap();
        assert_eq!(
            source.archive_url(&id).unwrap(),
            "http://127.0.0.1:8080/download?draft=x.1"
        );
    }

    #[test]
    fn rejects_bad_templates() {
        assert!(matches!(
            TemplateSource::new("https://api.example.com/drafts/archive"),
            Err(SourceError::MissingPlaceholder(_))
        ));
        assert!(matches!(
            TemplateSource::new("not a url/{id}"),
            Err(SourceError::InvalidUrl { .. })
        ));
        assert!(matches!(
            TemplateSource::new("ftp://example.com/{id}"),
            Err(SourceError::UnsupportedScheme(_))
        ));
    }
}
