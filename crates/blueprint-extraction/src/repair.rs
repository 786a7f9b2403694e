//! Single bounded repair pass for truncated or sloppy JSON.
//!
//! The pass walks the text once, aware of string literals and escapes, and:
//! - closes an unterminated string,
//! - drops commas directly before a closer or at the end of the text,
//! - closes brackets that were left open, innermost first,
//! - inserts closers skipped by a mismatched one (`[1, 2}` becomes `[1, 2]}`),
//! - drops closers that match nothing open,
//! - completes a dangling `"key":` with `null`.
//!
//! Already-valid JSON comes out unchanged.

/// Apply the repair pass to `text`.
#[must_use]
pub fn repair(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
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
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if stack.contains(&c) {
                    while let Some(expected) = stack.pop() {
                        drop_trailing_comma(&mut out);
                        out.push(expected);
                        if expected == c {
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    drop_trailing_comma(&mut out);
    if !stack.is_empty() && out.trim_end().ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = stack.pop() {
        drop_trailing_comma(&mut out);
        out.push(closer);
    }

    out
}

/// Remove a trailing `,` (and the whitespace after it).
fn drop_trailing_comma(out: &mut String) {
    let len = out.trim_end().len();
    if out[..len].ends_with(',') {
        out.truncate(len - 1);
    }
}
