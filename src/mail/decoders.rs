use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use log::warn;

use crate::error::DecodeError;
use crate::mail::payload::{Header, MessagePart, PartBody};

/// Gmail emits base64url with or without trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn decode_data(body: &PartBody) -> Result<String, DecodeError> {
    let data = body.data.as_deref().ok_or(DecodeError::MissingData)?;
    let bytes = URL_SAFE_LENIENT.decode(data.trim())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// First `text/plain` leaf in document order, descending into nested containers.
fn find_plain_text(parts: &[MessagePart]) -> Option<&MessagePart> {
    for part in parts {
        if part.mime_type.eq_ignore_ascii_case("text/plain") {
            return Some(part);
        }
        if let Some(sub) = part.parts.as_deref()
            && let Some(found) = find_plain_text(sub)
        {
            return Some(found);
        }
    }
    None
}

/// Decode the plain-text body of a payload.
///
/// A container yields its first `text/plain` part (empty string if none). A single part
/// yields its own body whatever its type.
pub fn decode_body(payload: &MessagePart) -> Result<String, DecodeError> {
    match payload.parts.as_deref() {
        Some(parts) => match find_plain_text(parts) {
            Some(part) => decode_data(&part.body),
            None => Ok(String::new()),
        },
        None => decode_data(&payload.body),
    }
}

/// Like [`decode_body`] but degrades to an empty body.
pub fn body_text(id: &str, payload: &MessagePart) -> String {
    decode_body(payload).unwrap_or_else(|e| {
        warn!("message {id}: could not decode body ({e}); using empty body");
        String::new()
    })
}

/// First header named `name` (case-insensitive), first match wins.
pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Cut `s` to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    fn leaf(mime: &str, text: Option<&str>) -> MessagePart {
        MessagePart {
            mime_type: mime.into(),
            body: PartBody {
                data: text.map(|t| URL_SAFE.encode(t)),
                ..PartBody::default()
            },
            ..MessagePart::default()
        }
    }

    fn container(mime: &str, parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: mime.into(),
            parts: Some(parts),
            ..MessagePart::default()
        }
    }

    #[test]
    fn single_part_body_is_decoded() {
        let p = leaf("text/plain", Some("Hello, world"));
        assert_eq!(decode_body(&p).unwrap(), "Hello, world");
    }

    #[test]
    fn single_html_part_is_still_decoded() {
        let p = leaf("text/html", Some("<p>hi</p>"));
        assert_eq!(decode_body(&p).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn multipart_returns_first_plain_text_part() {
        let p = container(
            "multipart/alternative",
            vec![
                leaf("text/html", Some("<b>html</b>")),
                leaf("text/plain", Some("first plain")),
                leaf("text/plain", Some("second plain")),
            ],
        );
        assert_eq!(decode_body(&p).unwrap(), "first plain");
    }

    #[test]
    fn nested_multipart_is_searched_in_order() {
        let p = container(
            "multipart/mixed",
            vec![
                container(
                    "multipart/alternative",
                    vec![
                        leaf("text/html", Some("<i>x</i>")),
                        leaf("TEXT/PLAIN", Some("nested plain")),
                    ],
                ),
                leaf("application/pdf", Some("%PDF")),
            ],
        );
        assert_eq!(decode_body(&p).unwrap(), "nested plain");
    }

    #[test]
    fn multipart_without_plain_text_is_empty() {
        let p = container(
            "multipart/mixed",
            vec![leaf("text/html", Some("<p>only html</p>"))],
        );
        assert_eq!(decode_body(&p).unwrap(), "");
        assert_eq!(decode_body(&container("multipart/mixed", vec![])).unwrap(), "");
    }

    #[test]
    fn missing_data_is_decode_error_and_degrades_to_empty() {
        let p = leaf("text/plain", None);
        assert!(matches!(decode_body(&p), Err(DecodeError::MissingData)));
        assert_eq!(body_text("m1", &p), "");
    }

    #[test]
    fn invalid_base64_degrades_to_empty() {
        let mut p = leaf("text/plain", None);
        p.body.data = Some("***not base64***".into());
        assert!(matches!(decode_body(&p), Err(DecodeError::Base64(_))));
        assert_eq!(body_text("m1", &p), "");
    }

    #[test]
    fn unpadded_base64url_is_accepted() {
        let mut p = leaf("text/plain", None);
        p.body.data = Some(URL_SAFE_NO_PAD.encode("ab?>"));
        assert_eq!(decode_body(&p).unwrap(), "ab?>");
    }

    #[test]
    fn header_lookup_first_match_case_insensitive() {
        let headers = vec![
            Header {
                name: "subject".into(),
                value: "first".into(),
            },
            Header {
                name: "Subject".into(),
                value: "second".into(),
            },
        ];
        assert_eq!(header_value(&headers, "Subject"), Some("first"));
        assert_eq!(header_value(&headers, "From"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
