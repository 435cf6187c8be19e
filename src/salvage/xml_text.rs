use std::borrow::Cow;

use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::filters::{first_rejection, XML_FILTERS};

// Element text: everything between a closing '>' and the next '<'.
static ELEMENT_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">([^<]+)<").expect("element text regex"));

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|(lt|gt|amp|quot|apos));")
        .expect("entity regex")
});

/// Decode XML entry bytes to text. Honors a UTF-16 BOM and never fails on bad sequences.
pub fn decode_xml_bytes(data: &[u8]) -> Cow<'_, str> {
    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(data);
    if had_errors {
        trace!("xml payload had invalid {} sequences", encoding.name());
    }
    text
}

/// Decode the predefined entities and numeric character references.
///
/// Malformed or unknown references are left as written instead of failing the fragment.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(decoded) = quick_xml::escape::unescape(raw) {
        return decoded;
    }
    ENTITY_RE.replace_all(raw, |caps: &Captures<'_>| {
        let decoded = if let Some(dec) = caps.get(1) {
            dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
        } else if let Some(hex) = caps.get(2) {
            u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            caps.get(3).map(|name| match name.as_str() {
                "lt" => '<',
                "gt" => '>',
                "amp" => '&',
                "quot" => '"',
                _ => '\'',
            })
        };
        match decoded {
            Some(ch) => ch.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// Permissive text scan of one XML document. Tolerates malformed markup and unknown
/// namespaces; attribute values and tag names never produce fragments.
pub fn extract_xml_fragments(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in ELEMENT_TEXT_RE.captures_iter(xml) {
        let decoded = decode_entities(&caps[1]);
        let text = decoded.trim();
        if text.is_empty() {
            continue;
        }
        // Edge whitespace is kept: it separates words when short fragments merge.
        match first_rejection(XML_FILTERS, text) {
            Some(reason) => trace!("xml fragment dropped ({reason}): {text:?}"),
            None => out.push(decoded.into_owned()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_element_text_and_drops_urls() {
        let xml = "<root><p>Hello</p><meta>http://example.com</meta></root>";
        assert_eq!(extract_xml_fragments(xml), vec!["Hello"]);
    }

    #[test]
    fn ignores_attributes_and_whitespace() {
        let xml = r#"<sf:p sf:style="body-text">  Paragraph one  </sf:p>
            <sf:p sf:style="x"/>
            <sf:text>Second</sf:text>"#;
        assert_eq!(extract_xml_fragments(xml), vec!["  Paragraph one  ", "Second"]);
    }

    #[test]
    fn leading_space_survives_for_merging() {
        let xml = "<r><t>Hello</t><t> world</t></r>";
        assert_eq!(extract_xml_fragments(xml), vec!["Hello", " world"]);
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; &quot;c&quot; &apos;d&apos;"), "a <b> & \"c\" 'd'");
        assert_eq!(decode_entities("&#20013;&#x6587;"), "中文");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn unknown_entities_survive() {
        assert_eq!(decode_entities("caf&eacute; &amp; bar"), "caf&eacute; & bar");
        assert_eq!(decode_entities("bad &#xZZ; ref &#65;"), "bad &#xZZ; ref A");
    }

    #[test]
    fn drops_noise_fragments() {
        let xml = "<a>x</a><a>xmlns:foo</a><a>123e4567-e89b-12d3-a456-426614174000</a>\
                   <a>SF_STYLE_NAME</a><a>2024</a><a>Real text</a>";
        assert_eq!(extract_xml_fragments(xml), vec!["Real text"]);
    }

    #[test]
    fn tolerates_malformed_markup() {
        let xml = "<a>First<b>Second</a></c>Third<unclosed";
        assert_eq!(extract_xml_fragments(xml), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let mut data = vec![0xFF, 0xFE];
        for unit in "<t>Hi</t>".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_xml_bytes(&data), "<t>Hi</t>");
        assert_eq!(decode_xml_bytes(b"<t>ok\xff</t>"), "<t>ok\u{fffd}</t>");
    }
}
