use std::borrow::Cow;

/// Strip terminal control characters and ANSI escape sequences from feed text.
///
/// Titles and descriptions come straight from remote documents and are printed
/// by `browse`; an embedded `ESC [` sequence could otherwise repaint the user's
/// terminal. Tab and newline survive; CSI sequences (`ESC [ ... final`) are
/// removed whole, any other control character is dropped on its own.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            // Parameter and intermediate bytes run until a final byte in 0x40..=0x7e
            for next in chars.by_ref() {
                if ('\u{40}'..='\u{7e}').contains(&next) {
                    break;
                }
            }
            continue;
        }
        if !is_stripped(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn is_stripped(c: char) -> bool {
    c.is_control() && c != '\t' && c != '\n'
}
