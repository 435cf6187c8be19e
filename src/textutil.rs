/// Full-width punctuation that shows up inside CJK prose.
pub const FULLWIDTH_PUNCTUATION: &[char] = &[
    '，', '。', '！', '？', '；', '：', '、', '“', '”', '‘', '’', '（', '）', '【', '】', '《', '》',
    '「', '」', '『', '』', '…', '—', '·', '～', '　',
];

/// Characters that close a sentence.
pub const SENTENCE_TERMINALS: &[char] = &['。', '！', '？', '.', '!', '?'];

pub fn is_cjk_ideograph(ch: char) -> bool {
    matches!(ch, '\u{3400}'..='\u{4dbf}' | '\u{4e00}'..='\u{9fff}' | '\u{f900}'..='\u{faff}')
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_ideograph)
}

/// Allow-list used when scanning decoded binary payloads for human-readable runs.
pub fn is_readable_char(ch: char) -> bool {
    is_cjk_ideograph(ch)
        || matches!(ch,
            '\u{3040}'..='\u{30ff}'   // hiragana + katakana
            | '\u{ac00}'..='\u{d7af}' // hangul syllables
            | '\u{20}'..='\u{7e}'     // printable ascii
            | '\u{a0}'..='\u{ff}'     // latin-1 supplement
            | '\t' | '\n' | '\r'
            | '\u{2028}' | '\u{2029}')
        || FULLWIDTH_PUNCTUATION.contains(&ch)
}

pub fn ends_with_terminal(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| SENTENCE_TERMINALS.contains(&c))
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cjk() {
        assert!(contains_cjk("hello 世界"));
        assert!(!contains_cjk("hello world"));
        assert!(!contains_cjk("こんにちは"));
        assert!(is_cjk_ideograph('中'));
        assert!(!is_cjk_ideograph('a'));
    }

    #[test]
    fn readable_chars_cover_scripts() {
        for ch in ['a', 'Z', ' ', '~', 'é', '中', 'あ', 'カ', '한', '，', '。', '\n', '\u{2029}'] {
            assert!(is_readable_char(ch), "{ch:?} should be readable");
        }
        for ch in ['\u{0}', '\u{1f}', '\u{7f}', '\u{fffd}', 'Ω', '😀'] {
            assert!(!is_readable_char(ch), "{ch:?} should not be readable");
        }
    }

    #[test]
    fn terminal_punctuation() {
        assert!(ends_with_terminal("Done."));
        assert!(ends_with_terminal("完成。 "));
        assert!(ends_with_terminal("真的？"));
        assert!(!ends_with_terminal("Hello"));
        assert!(!ends_with_terminal(""));
    }

    #[test]
    fn strips_controls() {
        assert_eq!(strip_control_chars("a\u{1}b\nc"), "abc");
        assert_eq!(char_len("中文ab"), 4);
    }
}
