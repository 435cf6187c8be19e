use log::trace;

use crate::textutil::{is_readable_char, strip_control_chars};

use super::filters::{first_rejection, BINARY_FILTERS};

/// Scan an opaque binary payload for runs of plausible human-readable text.
///
/// The payload is decoded as UTF-8 with invalid sequences replaced; the replacement
/// character is not readable, so it splits runs rather than aborting the scan.
pub fn extract_binary_fragments(data: &[u8]) -> Vec<String> {
    let (decoded, _) = encoding_rs::UTF_8.decode_without_bom_handling(data);
    let mut out = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, ch) in decoded.char_indices() {
        if is_readable_char(ch) {
            run_start.get_or_insert(idx);
        } else if let Some(start) = run_start.take() {
            push_run(&decoded[start..idx], &mut out);
        }
    }
    if let Some(start) = run_start {
        push_run(&decoded[start..], &mut out);
    }
    out
}

fn push_run(run: &str, out: &mut Vec<String>) {
    let text = run.trim();
    if text.is_empty() {
        return;
    }
    if let Some(reason) = first_rejection(BINARY_FILTERS, text) {
        trace!("binary run dropped ({reason}): {text:?}");
        return;
    }
    let cleaned = strip_control_chars(text);
    if !cleaned.trim().is_empty() {
        out.push(cleaned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_text_between_binary_noise() {
        let mut data = vec![0x08, 0x01, 0x12, 0x1b];
        data.extend_from_slice("这是正文内容".as_bytes());
        data.extend_from_slice(&[0x00, 0xff, 0x1a, 0x02]);
        data.extend_from_slice(b"Quarterly report");
        data.push(0x00);
        assert_eq!(extract_binary_fragments(&data), vec!["这是正文内容", "Quarterly report"]);
    }

    #[test]
    fn drops_structural_tokens() {
        let mut data = Vec::new();
        for token in [
            &b"TSWPArchive"[..],
            b"ABC",
            b"Made with iWork",
            b"0F3E2B1A-9C8D-4E7F-A6B5-C4D3E2F1A0B9",
            b"ab",
            b"kept text",
        ] {
            data.extend_from_slice(token);
            data.push(0x00);
        }
        assert_eq!(extract_binary_fragments(&data), vec!["kept text"]);
    }

    #[test]
    fn strips_residual_controls_inside_runs() {
        let data = b"\x00line one\r\nline two\x00";
        assert_eq!(extract_binary_fragments(data), vec!["line oneline two"]);
    }

    #[test]
    fn invalid_utf8_splits_runs() {
        let data = b"first part\xc3\x28second part";
        assert_eq!(extract_binary_fragments(data), vec!["first part", "(second part"]);
    }

    #[test]
    fn keeps_kana_hangul_and_fullwidth_punctuation() {
        let data = "\u{0}こんにちは、세계！\u{0}".as_bytes();
        assert_eq!(extract_binary_fragments(data), vec!["こんにちは、세계！"]);
    }
}
