//! Archive file naming.
//!
//! The final name comes from the response's Content-Disposition header when
//! present, otherwise from the last URL path segment if it looks like a file
//! name, otherwise `<id>.zip`.
//! Whatever is chosen is sanitized so it stays inside the destination directory.

use crate::task::TaskId;

/// Extension used when neither the server nor the URL names the archive.
const FALLBACK_EXTENSION: &str = "zip";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Picks the file name for a finished archive.
///
/// - `derive_archive_name(id, "https://h/drafts/abc/project.zip", None)` -> `"project.zip"`
/// - `derive_archive_name(id, "https://h/drafts/abc/archive", None)` -> `"abc.zip"`
/// - with `attachment; filename="My Draft.zip"` -> `"My_Draft.zip"`
/// - `derive_archive_name(id, "https://h/", None)` -> `"<id>.zip"`
pub fn derive_archive_name(id: &TaskId, url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(content_disposition_filename)
        .or_else(|| last_path_segment(url))
        .map(|raw| sanitize(&raw))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("{}.{}", id, FALLBACK_EXTENSION))
}

/// Filename from a Content-Disposition value. `filename*` (RFC 5987) wins over `filename`.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let Some((charset, rest)) = raw.split_once("''") else {
                    continue;
                };
                if !charset.eq_ignore_ascii_case("utf-8") {
                    continue;
                }
                let decoded = percent_decode(rest);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
            "filename" => {
                let name = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
                    Some(quoted) => unescape_quoted(quoted),
                    None => raw.to_string(),
                };
                if !name.is_empty() {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last non-empty path segment of `url`, percent-decoded, if it has an extension.
/// Extensionless segments are endpoint names shared by every draft.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    let (stem, ext) = decoded.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(decoded)
}

/// Replaces separators, control characters and whitespace with `_`, collapses
/// runs of `_`, trims dots/underscores at the edges and caps the length.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(next @ ('"' | '\\'))) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Lossy percent-decoding; malformed escapes are kept literally.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
