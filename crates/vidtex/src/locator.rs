//! Locator parsing and container format resolution.
//!
//! A locator is whatever string the asset layer hands us: a filesystem path,
//! a network URL, or an inline `data:` payload. The resolver's only output
//! is a MIME hint for the decoder; unrecognized formats degrade to engine
//! sniffing rather than failing.

use log::debug;

/// How an inline payload is encoded in its `data:` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Base64,
    /// Percent-encoded or plain-text payload.
    Plain,
}

/// A parsed resource locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Filesystem path or network URL.
    Url(String),
    /// Inline `data:` payload. The payload stays encoded here; decoding it
    /// is the playback engine's job, so a malformed payload surfaces as a
    /// load error instead of a parse failure.
    Data {
        mime: String,
        encoding: DataEncoding,
        payload: String,
    },
}

impl Locator {
    /// Parse a locator string. Infallible: anything that is not a `data:`
    /// URL is treated as a path/URL.
    pub fn parse(input: &str) -> Self {
        let Some(rest) = input.strip_prefix("data:") else {
            return Locator::Url(input.to_string());
        };
        let (header, payload) = match rest.split_once(',') {
            Some((header, payload)) => (header, payload),
            None => (rest, ""),
        };
        let (mime, encoding) = match header.strip_suffix(";base64") {
            Some(mime) => (mime, DataEncoding::Base64),
            None => (header, DataEncoding::Plain),
        };
        Locator::Data {
            mime: mime.to_string(),
            encoding,
            payload: payload.to_string(),
        }
    }

    /// MIME hint for the decoder, or `None` to let the engine sniff the
    /// stream itself.
    ///
    /// For URLs the extension decides, ignoring any query string or
    /// fragment; for data payloads the declared MIME type is authoritative.
    pub fn format_hint(&self) -> Option<&str> {
        match self {
            Locator::Url(url) => {
                let ext = extension_of(url)?;
                let mime = mime_for_extension(ext);
                if mime.is_none() {
                    debug!("no MIME mapping for extension {ext:?}, deferring to engine sniffing");
                }
                mime
            }
            Locator::Data { mime, .. } => {
                if mime.is_empty() { None } else { Some(mime) }
            }
        }
    }
}

/// Extension of a URL or path, with any query string (`?...`) and fragment
/// (`#...`) stripped first.
fn extension_of(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, ext) = path.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') || ext.contains('\\') {
        return None;
    }
    Some(ext)
}

/// Container extension → MIME decoder hint.
fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogv" | "ogg" => "video/ogg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_url_resolves_by_extension() {
        let locator = Locator::parse("assets/video/park.mp4");
        assert_eq!(locator.format_hint(), Some("video/mp4"));
    }

    #[test]
    fn query_string_does_not_change_the_hint() {
        let plain = Locator::parse("a/b.mp4");
        let with_query = Locator::parse("a/b.mp4?some=param");
        let with_fragment = Locator::parse("a/b.mp4#t=10");
        let with_both = Locator::parse("a/b.mp4?x=1#frag");
        assert_eq!(plain.format_hint(), with_query.format_hint());
        assert_eq!(plain.format_hint(), with_fragment.format_hint());
        assert_eq!(plain.format_hint(), with_both.format_hint());
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert_eq!(Locator::parse("clip.MP4").format_hint(), Some("video/mp4"));
        assert_eq!(Locator::parse("clip.WebM").format_hint(), Some("video/webm"));
    }

    #[test]
    fn unknown_extension_degrades_to_sniffing() {
        assert_eq!(Locator::parse("clip.xyz").format_hint(), None);
        assert_eq!(Locator::parse("no_extension").format_hint(), None);
        assert_eq!(Locator::parse("dir.v1/clip").format_hint(), None);
    }

    #[test]
    fn data_url_uses_declared_mime() {
        let locator = Locator::parse("data:video/webm;base64,GkXf");
        assert_eq!(locator.format_hint(), Some("video/webm"));
        match locator {
            Locator::Data {
                mime,
                encoding,
                payload,
            } => {
                assert_eq!(mime, "video/webm");
                assert_eq!(encoding, DataEncoding::Base64);
                assert_eq!(payload, "GkXf");
            }
            Locator::Url(_) => panic!("expected a data locator"),
        }
    }

    #[test]
    fn data_url_without_base64_marker_is_plain() {
        let locator = Locator::parse("data:video/mp4,abc");
        match locator {
            Locator::Data { encoding, .. } => assert_eq!(encoding, DataEncoding::Plain),
            Locator::Url(_) => panic!("expected a data locator"),
        }
    }

    #[test]
    fn empty_data_url_keeps_empty_parts() {
        let locator = Locator::parse("data:video/webm;base64,");
        assert_eq!(locator.format_hint(), Some("video/webm"));
        match locator {
            Locator::Data { payload, .. } => assert!(payload.is_empty()),
            Locator::Url(_) => panic!("expected a data locator"),
        }
    }

    #[test]
    fn data_url_with_no_declared_mime_has_no_hint() {
        assert_eq!(Locator::parse("data:,abc").format_hint(), None);
    }
}
