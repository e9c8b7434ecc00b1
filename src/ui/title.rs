use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st, ...
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Title of the panel showing the reply to the next user message, e.g.
/// `openai:gpt-4o-mini (1st message)`.
pub fn panel_title(identity: &str, user_turns: usize) -> String {
    format!("{identity} ({} message)", ordinal(user_turns + 1))
}

/// Cuts `text` to at most `max_width` columns, ending in `…` when shortened.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut width = 0;
    for grapheme in text.graphemes(true) {
        let w = UnicodeWidthStr::width(grapheme);
        if width + w + 1 > max_width {
            break;
        }
        out.push_str(grapheme);
        width += w;
    }
    out.push('…');
    out
}
