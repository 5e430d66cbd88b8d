//! Script segmentation for the synthesis API's per-request input limit.

/// Characters per segment.
pub const SEGMENT_MAX_CHARS: usize = 300;
/// Hard UTF-8 byte limit of one synthesis request.
pub const SEGMENT_MAX_BYTES: usize = 600;

fn is_cjk_break(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '\n')
}

fn is_latin_break(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split `text` into sentences, keeping the terminating punctuation.
///
/// Latin `.`/`!`/`?` only end a sentence when followed by whitespace, so
/// decimals and abbreviations such as `3.14` stay intact.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let end = idx + c.len_utf8();
        let boundary = is_cjk_break(c)
            || (is_latin_break(c)
                && chars.peek().map_or(true, |(_, next)| next.is_whitespace()));
        if boundary {
            out.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }

    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a script into segments of at most `max_chars` characters.
///
/// Sentences are packed greedily (joined by a space); a single sentence
/// longer than `max_chars` is cut into fixed-size pieces.  Empty or
/// whitespace-only input yields no segments.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0;

    for sentence in sentences(text) {
        let len = sentence.chars().count();

        if len > max_chars {
            if !cur.is_empty() {
                parts.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let chars: Vec<char> = sentence.chars().collect();
            parts.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if cur.is_empty() {
            cur.push_str(sentence);
            cur_len = len;
        } else if cur_len + len + 1 <= max_chars {
            cur.push(' ');
            cur.push_str(sentence);
            cur_len += len + 1;
        } else {
            parts.push(std::mem::replace(&mut cur, sentence.to_string()));
            cur_len = len;
        }
    }
    if !cur.is_empty() {
        parts.push(cur);
    }
    parts
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_segment() {
        assert_eq!(split_text("  你好。世界！ ", 300), vec!["你好。世界！"]);
    }

    #[test]
    fn blank_text_has_no_segments() {
        assert!(split_text("", 300).is_empty());
        assert!(split_text(" \n\t ", 300).is_empty());
    }

    #[test]
    fn sentences_are_packed_up_to_limit() {
        let text = "一二三。四五六。七八九。";
        let parts = split_text(text, 9);
        assert_eq!(parts, vec!["一二三。 四五六。", "七八九。"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 9));
    }

    #[test]
    fn overlong_sentence_is_hard_split() {
        let text = format!("{}。短句。", "长".repeat(25));
        let parts = split_text(&text, 10);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "长".repeat(10));
        assert_eq!(parts[2], format!("{}。", "长".repeat(5)));
        assert_eq!(parts[3], "短句。");
    }

    #[test]
    fn latin_sentences_split_on_whitespace_after_period() {
        let text = "Pi is 3.14 roughly. It is irrational! Really?";
        let parts = split_text(text, 20);
        assert_eq!(
            parts,
            vec!["Pi is 3.14 roughly.", "It is irrational!", "Really?"]
        );
    }

    #[test]
    fn truncate_bytes_respects_char_boundaries() {
        assert_eq!(truncate_bytes("abc", 600), "abc");
        // Each CJK char is 3 bytes.
        assert_eq!(truncate_bytes("你好世界", 7), "你好");
        assert_eq!(truncate_bytes(&"字".repeat(300), SEGMENT_MAX_BYTES).len(), 600);
    }
}
