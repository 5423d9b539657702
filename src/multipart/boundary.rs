//! Multipart boundary codec.
//!
//! Pure functions: the outbound part prefixes and terminator, and boundary
//! discovery from an inbound `content-type` value.
//!
//! ```text
//! prefix:     CRLF "--" boundary CRLF <headers> CRLF
//! terminator: CRLF "--" boundary "--" CRLF
//! ```

use heapless::String as FixedString;

pub const CRLF: &str = "\r\n";

/// Two-character marker that turns a boundary term into a delimiter.
pub const DELIMITER_MARKER: &str = "--";

/// RFC 2046 limit on the boundary term.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Content type that marks a part as binary audio.
pub const AUDIO_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of the metadata part.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// A discovered boundary, already prefixed with [`DELIMITER_MARKER`].
pub type BoundaryToken = FixedString<{ MAX_BOUNDARY_LEN + 2 }>;

/// The two part layouts of an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Metadata,
    Audio,
}

impl PartKind {
    fn form_name(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Audio => "audio",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::Metadata => JSON_CONTENT_TYPE,
            Self::Audio => AUDIO_CONTENT_TYPE,
        }
    }
}

/// Delimiter line plus part headers for `kind`.
pub fn render_part_prefix(kind: PartKind, boundary: &str) -> Vec<u8> {
    format!(
        "{CRLF}{DELIMITER_MARKER}{boundary}{CRLF}\
         Content-Disposition: form-data; name=\"{}\"{CRLF}\
         Content-Type: {}{CRLF}{CRLF}",
        kind.form_name(),
        kind.content_type(),
    )
    .into_bytes()
}

/// Closing delimiter of the body.
pub fn render_body_terminator(boundary: &str) -> Vec<u8> {
    format!("{CRLF}{DELIMITER_MARKER}{boundary}{DELIMITER_MARKER}{CRLF}").into_bytes()
}

/// `content-type` value announcing an outbound body framed with `boundary`.
pub fn form_data_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary=\"{boundary}\"")
}

/// Find the `boundary=` parameter of a `content-type` value.
///
/// Returns the term prefixed with `--`, i.e. exactly the delimiter that
/// will appear in the body.  The parameter name is matched
/// case-insensitively, surrounding quotes are stripped, and the value ends
/// at `;` or the end of the header.  `None` if absent or not a valid
/// RFC 2046 boundary (see [`is_valid_boundary`]).
pub fn extract_boundary_token(header_value: &str) -> Option<BoundaryToken> {
    let raw = header_value.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("boundary")
            .then_some(value.trim())
    })?;

    let term = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw);

    if !is_valid_boundary(term) {
        return None;
    }

    let mut token = BoundaryToken::new();
    token.push_str(DELIMITER_MARKER).ok()?;
    token.push_str(term).ok()?;
    Some(token)
}

/// Whether `term` is usable as an outbound boundary (RFC 2046 `bchars`).
pub fn is_valid_boundary(term: &str) -> bool {
    if term.is_empty() || term.len() > MAX_BOUNDARY_LEN || term.ends_with(' ') {
        return false;
    }
    term.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&b))
}
