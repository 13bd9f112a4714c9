//! Response header tracking for the curl header callback.

/// Headers of the final response. Redirect hops reset the state, so after the
/// transfer it describes the response the body came from.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
    complete: bool,
}

impl ResponseHeaders {
    /// Feeds one raw header line. Returns true when the line ended a header block.
    pub fn feed(&mut self, line: &[u8]) -> bool {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            self.complete = true;
            return true;
        }
        if line.starts_with("HTTP/") {
            *self = ResponseHeaders {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|code| code.parse().ok()),
                ..Default::default()
            };
            return false;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                self.content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("content-disposition") {
                self.content_disposition = Some(value.to_string());
            }
        }
        false
    }

    /// True once a complete header block with a 2xx status has been seen.
    pub fn is_success(&self) -> bool {
        self.complete && matches!(self.status, Some(200..=299))
    }
}
