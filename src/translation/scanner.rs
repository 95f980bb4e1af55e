#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// What the scanner saw at a byte position while in `State::Normal`.
pub(super) enum Event<'a> {
    /// A top-level (paren depth 0) identifier or keyword.
    Word(&'a str),
    /// A `?` placeholder; `digits` holds the explicit number of `?NNN`.
    Placeholder { start: usize, end: usize, digits: Option<&'a str> },
    /// A `$NNN` placeholder.
    DollarPlaceholder { start: usize, end: usize, digits: &'a str },
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `$tag$` opener at `start`; returns the tag and the index of its closing `$`.
fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let tag_len = bytes[start + 1..]
        .iter()
        .take_while(|b| is_word_byte(**b))
        .count();
    let close = start + 1 + tag_len;
    if bytes.get(close) != Some(&b'$') {
        return None;
    }
    let tag = &bytes[start + 1..close];
    // `$1$` is not a tag: tags cannot start with a digit
    if tag.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    String::from_utf8(tag.to_vec()).ok().map(|tag| (tag, close))
}

/// Whether the `$` at `idx` opens the closing `$tag$` delimiter.
fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}

/// Walk `sql`, skipping quoted literals, quoted identifiers, comments and dollar-quoted
/// bodies, and report placeholders and top-level words to `visit` in source order.
pub(super) fn scan<'a>(sql: &'a str, mut visit: impl FnMut(Event<'a>)) {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut depth: u32 = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    } else if let Some((end, digits)) = scan_digits(bytes, idx + 1) {
                        visit(Event::DollarPlaceholder {
                            start: idx,
                            end,
                            digits,
                        });
                        idx = end - 1;
                    }
                }
                b'?' => {
                    let (end, digits) = match scan_digits(bytes, idx + 1) {
                        Some((end, digits)) => (end, Some(digits)),
                        None => (idx + 1, None),
                    };
                    visit(Event::Placeholder {
                        start: idx,
                        end,
                        digits,
                    });
                    idx = end - 1;
                }
                _ if is_word_byte(b) && (idx == 0 || !is_word_byte(bytes[idx - 1])) => {
                    let mut end = idx;
                    while end < bytes.len() && is_word_byte(bytes[end]) {
                        end += 1;
                    }
                    if depth == 0 && !b.is_ascii_digit() {
                        visit(Event::Word(&sql[idx..end]));
                    }
                    idx = end - 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(level) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(level + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if level == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(level - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }
}
