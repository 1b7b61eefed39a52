//! Evidence locations for deterministic verdicts.
//!
//! A location is the line a match sits on, rendered as
//! `"line N: <trimmed line>"`, so a reviewer can find it in the report.

/// Most locations attached to a single verdict.
pub const MAX_LOCATIONS: usize = 5;

/// Longest line excerpt, in characters.
pub const MAX_SNIPPET_CHARS: usize = 120;

/// Render the line containing byte `offset` of `text`.
pub fn line_snippet(text: &str, offset: usize) -> String {
    let offset = floor_char_boundary(text, offset.min(text.len()));
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = line_end(text, offset);
    let line_number = text[..start].matches('\n').count() + 1;

    render(line_number, &text[start..end])
}

/// Snippets for a set of match offsets: one per line, in order, capped.
///
/// Walks the text once, so the cost is linear in the text length however
/// many offsets there are.
pub fn snippets(text: &str, offsets: impl IntoIterator<Item = usize>) -> Vec<String> {
    let mut offsets: Vec<usize> = offsets
        .into_iter()
        .map(|offset| floor_char_boundary(text, offset.min(text.len())))
        .collect();
    offsets.sort_unstable();

    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0;
    let mut line_number = 1;
    let mut line_start = 0;
    let mut emitted_end: Option<usize> = None;

    for offset in offsets {
        if emitted_end.is_some_and(|end| offset <= end) {
            continue;
        }

        for (i, byte) in bytes[cursor..offset].iter().enumerate() {
            if *byte == b'\n' {
                line_number += 1;
                line_start = cursor + i + 1;
            }
        }

        let end = line_end(text, offset);
        out.push(render(line_number, &text[line_start..end]));
        if out.len() == MAX_LOCATIONS {
            break;
        }

        emitted_end = Some(end);
        cursor = end;
    }
    out
}

fn line_end(text: &str, offset: usize) -> usize {
    text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len())
}

fn render(line_number: usize, line: &str) -> String {
    let excerpt: String = line.trim().chars().take(MAX_SNIPPET_CHARS).collect();
    format!("line {}: {}", line_number, excerpt)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_snippet_numbers_lines() {
        let text = "Title\n  Opinion: unqualified  \nEnd";
        let offset = text.find("Opinion").unwrap();
        assert_eq!(line_snippet(text, offset), "line 2: Opinion: unqualified");
    }

    #[test]
    fn test_snippet_truncated() {
        let text = "x".repeat(500);
        let snippet = line_snippet(&text, 10);
        assert_eq!(snippet.len(), "line 1: ".len() + MAX_SNIPPET_CHARS);
    }

    #[test]
    fn test_one_snippet_per_line_and_capped() {
        let text = "a a\nb\nc\nd\ne\nf\ng";
        let offsets = text.char_indices().filter(|(_, c)| c.is_alphabetic()).map(|(i, _)| i);
        let out = snippets(text, offsets);
        assert_eq!(out.len(), MAX_LOCATIONS);
        assert_eq!(out[0], "line 1: a a");
        assert_eq!(out[1], "line 2: b");
    }

    #[test]
    fn test_snippets_agree_with_line_snippet() {
        let text = "Intro\n\nencryption at rest\nMFA and encryption\n  firewall\nend";
        let offsets: Vec<usize> = text.match_indices("encryption").map(|(i, _)| i).collect();
        let expected: Vec<String> = offsets.iter().map(|&o| line_snippet(text, o)).collect();

        assert_eq!(snippets(text, offsets.iter().rev().copied()), expected);
        assert_eq!(expected, vec!["line 3: encryption at rest", "line 4: MFA and encryption"]);
    }

    #[test]
    fn test_offset_on_newline_belongs_to_its_line() {
        let text = "first\nsecond";
        assert_eq!(snippets(text, [5, 6]), vec!["line 1: first", "line 2: second"]);
    }

    #[test]
    fn test_many_offsets_on_one_long_line() {
        let text = "control ".repeat(200_000);
        let offsets: Vec<usize> = (0..200_000).map(|i| i * 8).collect();

        let started = std::time::Instant::now();
        let out = snippets(&text, offsets);

        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("line 1: control control"));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_offset_inside_multibyte_char() {
        let text = "é control";
        assert_eq!(line_snippet(text, 1), "line 1: é control");
    }
}
