//! Decoding and the tilde/smart-punctuation passes described in spec §4.1.
//!
//! EWC shepherds characters that would otherwise be mistaken for markup
//! through the pipeline by shifting them into the Unicode private-use band
//! `[U+EF00, U+EFFF]`. Everything in this module either puts characters into
//! that band or takes them back out.

/// Start of the private-use escape band. A character `c` is hidden as
/// `ESCAPE_BAND_START + (c as u32)`.
pub const ESCAPE_BAND_START: u32 = 0xEF00;

/// Decode raw bytes into text.
///
/// The original implementation decodes per-line against a configurable
/// input encoding, dropping bytes that don't decode. This crate only reads
/// UTF-8 sources and falls back to the replacement character for invalid
/// sequences rather than dropping bytes outright, matching `String`'s own
/// lossy-decode idiom.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Shift tilde-escaped characters into the private-use band.
///
/// For every `~X` pair, `X` is hidden as `ESCAPE_BAND_START + X`. The pair
/// `~-` is the one exception: the dash is hidden as usual but also left in
/// place as a literal `-`, so that a later smart-dash pass can see it and
/// knows not to touch it (see [`smart_quotes_and_dashes`]). A trailing,
/// unpaired `~` becomes a non-breaking space.
pub fn tilde_escapes(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '~' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if i + 1 == chars.len() {
            out.push('\u{00A0}');
            i += 1;
            continue;
        }
        let escaped = chars[i + 1];
        match char::from_u32(ESCAPE_BAND_START + escaped as u32) {
            Some(hidden) => out.push(hidden),
            None => {
                // Outside the band we can represent; leave both characters alone.
                out.push('~');
                out.push(escaped);
                i += 2;
                continue;
            }
        }
        if escaped == '-' {
            out.push('-');
        }
        i += 2;
    }
    out
}

/// Reverse [`tilde_escapes`] and drop the control characters EWC never
/// wants to see reach the renderer (tab and newline are kept).
pub fn remove_escapes(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            let cp = c as u32;
            let shifted = if (0xEF00..=0xEFFF).contains(&cp) {
                char::from_u32(cp - ESCAPE_BAND_START).unwrap_or(c)
            } else {
                c
            };
            let scp = shifted as u32;
            let removable = (0x00..=0x08).contains(&scp)
                || (0x0B..=0x1F).contains(&scp)
                || (0x7F..=0x9F).contains(&scp);
            if removable { None } else { Some(shifted) }
        })
        .collect()
}

const CAN_PRECEDE: [char; 8] = [' ', '\t', '\n', '\u{00A0}', '(', '\u{201C}', '\u{2018}', '\u{2014}'];
const CAN_FOLLOW: [char; 16] = [
    ' ', '\t', '\n', '\u{00A0}', ')', ':', ';', '\'', '"', ',', '.', '?', '!', '\u{201D}',
    '\u{2019}', '\u{2014}',
];

/// Literal-dash sentinel: `ESCAPE_BAND_START + '-'`. A `-` immediately
/// preceded by this marker came from a `~-` escape and is never smart-dashed.
const LITERAL_DASH_MARKER: char = '\u{EF2D}';

/// Turn straight quotes into curly ones and runs of hyphens into en/em
/// dashes.
///
/// A run of three hyphens becomes en-dash then em-dash rather than two
/// independent en-dashes, so the pass carries a `converted_endash` flag
/// across the scan exactly as the original does, overwriting the previous
/// output character with a NUL sentinel that gets filtered out at the end.
pub fn smart_quotes_and_dashes(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut v: Vec<char> = Vec::with_capacity(s.chars().count() + 2);
    v.push(' ');
    v.extend(s.chars());
    v.push(' ');
    let last = v.len() - 1;

    let mut converted_endash = false;
    for i in 1..last {
        let pre = v[i - 1];
        if v[i] == '-' {
            if pre == LITERAL_DASH_MARKER {
                v[i] = LITERAL_DASH_MARKER;
            } else if pre == '-' {
                v[i - 1] = '\0';
                v[i] = '\u{2013}'; // en dash
                converted_endash = true;
            } else if pre == '\u{2013}' && converted_endash {
                v[i - 1] = '\0';
                v[i] = '\u{2014}'; // em dash
                converted_endash = false;
            }
            continue;
        }

        let post = v[i + 1];
        if v[i] == '"' {
            if CAN_PRECEDE.contains(&pre) && !post.is_whitespace() {
                v[i] = '\u{201C}'; // left double quote
            } else if CAN_FOLLOW.contains(&post) && !pre.is_whitespace() {
                v[i] = '\u{201D}'; // right double quote
            }
        } else if v[i] == '\'' {
            if CAN_PRECEDE.contains(&pre) && !post.is_whitespace() {
                v[i] = '\u{2018}'; // left single quote
            } else if CAN_FOLLOW.contains(&post) && !pre.is_whitespace() {
                v[i] = '\u{2019}'; // right single quote
            }
        }
    }

    v[1..last].iter().filter(|&&c| c != '\0').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_hides_the_next_character() {
        let hidden = tilde_escapes("a~*b");
        assert_eq!(hidden.chars().nth(1), char::from_u32(ESCAPE_BAND_START + '*' as u32));
        assert_eq!(remove_escapes(&hidden), "a*b");
    }

    #[test]
    fn trailing_tilde_becomes_nbsp() {
        assert_eq!(tilde_escapes("x~"), "x\u{00A0}");
    }

    #[test]
    fn tilde_dash_keeps_a_literal_dash() {
        let hidden = tilde_escapes("~-");
        assert_eq!(hidden.chars().last(), Some('-'));
        assert_eq!(hidden.chars().next(), Some(LITERAL_DASH_MARKER));
    }

    #[test]
    fn escaped_dash_is_not_smart_dashed() {
        let hidden = tilde_escapes("a ~- b");
        let smart = smart_quotes_and_dashes(&hidden);
        assert_eq!(remove_escapes(&smart), "a -- b");
    }

    #[test]
    fn double_hyphen_becomes_en_dash() {
        assert_eq!(smart_quotes_and_dashes("0--1"), "0\u{2013}1");
    }

    #[test]
    fn triple_hyphen_collapses_to_a_single_em_dash() {
        assert_eq!(smart_quotes_and_dashes("with---an em dash"), "with\u{2014}an em dash");
    }

    #[test]
    fn quotes_turn_curly() {
        assert_eq!(
            smart_quotes_and_dashes("A \"quote\" with 0--1"),
            "A \u{201C}quote\u{201D} with 0\u{2013}1"
        );
    }

    #[test]
    fn apostrophes_inside_words_stay_straight() {
        assert_eq!(
            smart_quotes_and_dashes("You're apostrophes aren't quotes."),
            "You're apostrophes aren't quotes."
        );
    }

    #[test]
    fn control_characters_are_stripped_but_tab_and_newline_survive() {
        let input = "A\u{0008}B\tC\nD\u{0081}E";
        assert_eq!(remove_escapes(input), "AB\tC\nDE");
    }
}
