//! Message layout: fitting free text onto the display's fixed lines.

use crate::error::LayoutError;

/// Split `text` into at most `max_lines` lines of at most `chars_per_line`
/// characters.
///
/// Explicit newlines are honoured first (a `\r` before the `\n` is dropped).
/// Each resulting line that is still too long is wrapped at the last space
/// within the first `chars_per_line + 1` characters; the space itself is
/// consumed and an empty piece before it is dropped. A word that cannot be
/// broken is an error, as is a text needing more than `max_lines` lines.
pub fn split_message(
    text: &str,
    max_lines: usize,
    chars_per_line: usize,
) -> Result<Vec<String>, LayoutError> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        wrap_line(line, chars_per_line, &mut lines)?;
    }

    if lines.len() > max_lines {
        return Err(LayoutError::Overflow {
            text: text.to_string(),
            required: lines.len(),
            max_lines,
        });
    }
    Ok(lines)
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) -> Result<(), LayoutError> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= width {
        out.push(line.to_string());
        return Ok(());
    }

    let Some(space) = chars[..=width].iter().rposition(|c| *c == ' ') else {
        return Err(LayoutError::WordTooLong {
            line: line.to_string(),
            chars_per_line: width,
        });
    };

    if space > 0 {
        out.push(chars[..space].iter().collect());
    }
    let rest: String = chars[space + 1..].iter().collect();
    wrap_line(&rest, width, out)
}
