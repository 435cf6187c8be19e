use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

/// Parse one package part into element/text events. Declarations, comments and
/// processing instructions are dropped. Fails on markup that is not well-formed.
pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> Result<XmlPart> {
    let bad_part = |e: &dyn std::fmt::Display| Error::ContainerFormat(format!("{name}: {e}"));

    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).map_err(|e| bad_part(&e))?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                depth += 1;
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s).map_err(|e| bad_part(&e))?,
                });
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s).map_err(|e| bad_part(&e))?,
                });
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| bad_part(&e))?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => {
                events.push(XmlEvent::Text {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(bad_part(&"unclosed element at end of part"));
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(
    s: &BytesStart<'_>,
) -> std::result::Result<Vec<(String, String)>, quick_xml::Error> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value()?.into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// One `w:p` read back from a document part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParagraphText {
    pub style: Option<String>,
    pub text: String,
}

/// Concatenated `w:t` text of every paragraph, with its `w:pStyle`, in document order.
pub fn paragraph_texts(part: &XmlPart) -> Vec<ParagraphText> {
    let mut out = Vec::new();
    let mut current: Option<ParagraphText> = None;
    let mut in_t = false;

    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, .. } if name == "w:p" => {
                current = Some(ParagraphText {
                    style: None,
                    text: String::new(),
                });
            }
            XmlEvent::Empty { name, .. } if name == "w:p" => {
                out.push(ParagraphText {
                    style: None,
                    text: String::new(),
                });
            }
            XmlEvent::End { name } if name == "w:p" => {
                if let Some(p) = current.take() {
                    out.push(p);
                }
            }
            XmlEvent::Empty { name, attrs } if name == "w:pStyle" => {
                if let Some(p) = current.as_mut() {
                    p.style = find_attr(attrs, "w:val").map(str::to_string);
                }
            }
            XmlEvent::Start { name, .. } if name == "w:t" => in_t = true,
            XmlEvent::End { name } if name == "w:t" => in_t = false,
            XmlEvent::Text { text } if in_t => {
                if let Some(p) = current.as_mut() {
                    p.text.push_str(text);
                }
            }
            _ => {}
        }
    }
    out
}

/// XML 1.0 forbids most control characters even as character references.
pub fn is_xml_char(ch: char) -> bool {
    matches!(ch,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{d7ff}'
        | '\u{e000}'..='\u{fffd}'
        | '\u{10000}'..='\u{10ffff}')
}

/// Escape `& < > " '` and drop characters XML cannot carry, so any salvaged text can be
/// placed in element content or an attribute value.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return quick_xml::escape::escape(text);
    }
    let cleaned: String = text.chars().filter(|c| is_xml_char(*c)).collect();
    Cow::Owned(quick_xml::escape::escape(&cleaned).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_markup_characters() {
        assert_eq!(
            escape_xml(r#"a & b < c > d " e ' f"#),
            "a &amp; b &lt; c &gt; d &quot; e &apos; f"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn drops_characters_xml_cannot_carry() {
        assert_eq!(escape_xml("a\u{1}b\u{b}c\tend"), "abc\tend");
        assert_eq!(escape_xml("\u{fffe}x"), "x");
    }

    #[test]
    fn reads_paragraph_texts() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="urn:w"><w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Doc &amp; Co</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">one </w:t></w:r><w:r><w:t>two</w:t></w:r></w:p>
<w:p/>
</w:body></w:document>"#;
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let paras = paragraph_texts(&part);
        assert_eq!(
            paras,
            vec![
                ParagraphText {
                    style: Some("Title".to_string()),
                    text: "Doc & Co".to_string()
                },
                ParagraphText {
                    style: None,
                    text: "one two".to_string()
                },
                ParagraphText {
                    style: None,
                    text: String::new()
                },
            ]
        );
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert!(parse_xml_part("x.xml", b"<a><b></a>").is_err());
        assert!(parse_xml_part("x.xml", b"<a><b>").is_err());
    }
}
