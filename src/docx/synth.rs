//! Minimal word-processing package writer.
//!
//! The output always holds the same five parts, written in this order:
//! `[Content_Types].xml`, `_rels/.rels`, `word/document.xml`,
//! `word/_rels/document.xml.rels` and `word/styles.xml`. Only two paragraph styles
//! exist: `Title` for the first paragraph and `Normal` for everything after it.

use log::debug;

use crate::docx::package::{
    DocxPackage, CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART, PACKAGE_RELS_PART,
    STYLES_PART,
};
use crate::docx::xml::escape_xml;
use crate::error::Result;
use crate::salvage::ExtractedContent;

/// Language of the fixed text the synthesizer adds on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "cn" => Some(Self::Zh),
            "en" | "en-us" | "en_us" => Some(Self::En),
            _ => None,
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Self::Zh => "转换的文档",
            Self::En => "Converted Document",
        }
    }

    /// Body used when nothing survived normalization.
    pub fn placeholder_paragraphs(self) -> &'static [&'static str] {
        match self {
            Self::Zh => &[
                "此文档已从 Pages 格式转换，但未能提取到可读的文本内容。",
                "可能的原因：",
                "1. 文档使用了较新的 Pages 二进制格式，文本无法直接读取。",
                "2. 文档主要包含图片、图表或其他非文本内容。",
                "3. 文档受密码保护或内容已加密。",
                "建议：在 Pages 中打开原文档，使用“文件 > 导出为 > Word”获得完整的转换结果。",
            ],
            Self::En => &[
                "This document was converted from Pages, but no readable text could be extracted.",
                "Possible causes:",
                "1. The document uses a newer binary-only Pages format whose text cannot be read directly.",
                "2. The document consists mainly of images, charts or other non-text content.",
                "3. The document is password protected or its content is encrypted.",
                "Recommendation: open the original in Pages and use File > Export To > Word for a complete conversion.",
            ],
        }
    }
}

pub const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

pub const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

pub const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Title">
    <w:name w:val="Title"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:jc w:val="center"/><w:spacing w:after="240"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="36"/><w:szCs w:val="36"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:pPr><w:spacing w:after="120"/></w:pPr>
    <w:rPr><w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr>
  </w:style>
</w:styles>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
"#;

// A4 portrait, one inch margins.
const DOCUMENT_TAIL: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>
</w:body>
</w:document>"#;

fn push_paragraph(out: &mut String, style: &str, text: &str) {
    let space = if text.trim() != text {
        r#" xml:space="preserve""#
    } else {
        ""
    };
    out.push_str(r#"<w:p><w:pPr><w:pStyle w:val=""#);
    out.push_str(style);
    out.push_str(r#""/></w:pPr><w:r><w:t"#);
    out.push_str(space);
    out.push('>');
    out.push_str(&escape_xml(text));
    out.push_str("</w:t></w:r></w:p>\n");
}

/// `word/document.xml` with a `Title` paragraph followed by one `Normal` paragraph per entry.
pub fn document_xml<S: AsRef<str>>(title: &str, paragraphs: &[S]) -> String {
    let mut out = String::with_capacity(
        DOCUMENT_HEAD.len()
            + DOCUMENT_TAIL.len()
            + paragraphs.iter().map(|p| p.as_ref().len() + 96).sum::<usize>(),
    );
    out.push_str(DOCUMENT_HEAD);
    push_paragraph(&mut out, "Title", title);
    for p in paragraphs {
        push_paragraph(&mut out, "Normal", p.as_ref());
    }
    out.push_str(DOCUMENT_TAIL);
    out
}

/// Write the package for `content`. Images are carried in `content` but not placed.
pub fn synthesize_docx(content: &ExtractedContent, locale: Locale) -> Result<Vec<u8>> {
    let title = match content.title.trim() {
        "" => locale.default_title(),
        t => t,
    };
    let body = if content.paragraphs.is_empty() {
        document_xml(title, locale.placeholder_paragraphs())
    } else {
        document_xml(title, content.paragraphs.as_slice())
    };

    let mut pkg = DocxPackage::new();
    pkg.push_part(CONTENT_TYPES_PART, CONTENT_TYPES_XML);
    pkg.push_part(PACKAGE_RELS_PART, PACKAGE_RELS_XML);
    pkg.push_part(DOCUMENT_PART, body);
    pkg.push_part(DOCUMENT_RELS_PART, DOCUMENT_RELS_XML);
    pkg.push_part(STYLES_PART, STYLES_XML);
    let bytes = pkg.to_bytes()?;
    debug!(
        "synthesized {} bytes ({} paragraphs, {} images not placed)",
        bytes.len(),
        content.paragraphs.len(),
        content.images.len()
    );
    Ok(bytes)
}
