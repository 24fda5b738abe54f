// crates/nlu/src/normalize.rs

/// Keyword-matching form of an utterance: full-width ASCII folded to half
/// width, then lowercased. Slots are always read from the original text.
pub fn normalize(text: &str) -> String {
    text.chars().map(half_width).collect::<String>().to_lowercase()
}

/// Maps full-width digits (U+FF10..U+FF19) to ASCII, leaving everything else untouched.
pub fn to_ascii_digits(text: &str) -> String {
    text.chars().map(ascii_digit).collect()
}

fn half_width(c: char) -> char {
    match c {
        '！'..='～' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        _ => c,
    }
}

fn ascii_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        _ => c,
    }
}
