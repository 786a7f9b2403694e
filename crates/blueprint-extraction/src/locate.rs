/// Remove a surrounding Markdown code fence, if any.
///
/// A ```` ```json ```` fence wins over a bare one. A missing closing fence
/// (truncated output) keeps everything after the opening fence.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    if let Some(pos) = find_ascii_case_insensitive(text, "```json") {
        let after = &text[pos + "```json".len()..];
        let end = after.find("```").unwrap_or(after.len());
        return after[..end].trim();
    }

    if let Some(pos) = text.find("```") {
        let mut after = &text[pos + 3..];
        if let Some(line_end) = after.find('\n') {
            let tag = after[..line_end].trim();
            if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                after = &after[line_end + 1..];
            }
        }
        let end = after.rfind("```").unwrap_or(after.len());
        return after[..end].trim();
    }

    text
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Slice from the first `{` or `[` to its matching closer.
///
/// Brackets inside string literals are ignored. When the value never
/// closes, the rest of the text is returned for the repair pass.
#[must_use]
pub fn locate_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let body = &text[start..];

    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' if stack.last() == Some(&c) => {
                stack.pop();
                if stack.is_empty() {
                    return Some(&body[..=idx]);
                }
            }
            _ => {}
        }
    }

    Some(body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fences("x\n```json\n{\"a\":1}\n```\ny"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_strip_bare_fence_with_tag() {
        assert_eq!(strip_code_fences("```js\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_unclosed_fence_keeps_tail() {
        assert_eq!(strip_code_fences("```json\n{\"a\": [1"), "{\"a\": [1");
    }

    #[test]
    fn test_locate_ignores_brackets_in_strings() {
        let text = r#"Result: {"note": "use } and ]", "n": [1]} trailing {junk}"#;
        assert_eq!(
            locate_json(text),
            Some(r#"{"note": "use } and ]", "n": [1]}"#)
        );
    }

    #[test]
    fn test_locate_truncated_returns_rest() {
        assert_eq!(locate_json("pre {\"a\": [1, 2"), Some("{\"a\": [1, 2"));
        assert_eq!(locate_json("nothing"), None);
    }
}
