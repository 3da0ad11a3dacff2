//! Turning script files into parser input and errors into caret-annotated
//! reports.

use crate::span::Position;

pub const OPEN_TAG: &[u8] = b"<?davi";
pub const CLOSE_TAG: &[u8] = b"?>";

const TAB_WIDTH: usize = 4;

fn remove_first(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    match haystack.windows(needle.len()).position(|window| window == needle) {
        Some(start) => [&haystack[..start], &haystack[start + needle.len()..]].concat(),
        None => haystack.to_vec(),
    }
}

/// Removes the first `<?davi` and the first `?>` and trims surrounding
/// whitespace. The source stays raw bytes so the lexer can report invalid
/// UTF-8 itself.
pub fn strip_wrapper(source: &[u8]) -> Vec<u8> {
    let source = remove_first(&remove_first(source, OPEN_TAG), CLOSE_TAG);
    let start = source
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(source.len());
    let end = source
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    source[start..end].to_vec()
}

/// Renders `message` framed by dividers, with the offending source line and a
/// caret under `position`:
///
/// ```text
/// -----------------------------------------
/// echo(1 +)
///         ^
/// -----------------------------------------
/// parse error at 1:9: expected expression, not )
/// ```
pub fn render(source: &[u8], position: Position, message: &str) -> String {
    let divider = "-".repeat(message.chars().count());
    let line = String::from_utf8_lossy(
        source
            .split(|&b| b == b'\n')
            .nth(position.line.saturating_sub(1))
            .unwrap_or_default(),
    )
    .trim_end_matches('\r')
    .to_string();

    let before_column = position.column.saturating_sub(1);
    let tabs = line.chars().take(before_column).filter(|&c| c == '\t').count();
    let caret = format!(
        "{}{}^",
        " ".repeat(before_column),
        " ".repeat((TAB_WIDTH - 1) * tabs)
    );

    format!(
        "{divider}\n{}\n{caret}\n{divider}\n{message}\n",
        line.replace('\t', &" ".repeat(TAB_WIDTH))
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_strip_wrapper() {
        assert_eq!(strip_wrapper(b"<?davi\n echo(1)\n?>\n"), b"echo(1)");
        assert_eq!(strip_wrapper(b"  echo(1)  "), b"echo(1)");
        // Only the first occurrence of each tag goes.
        assert_eq!(
            strip_wrapper(b"<?davi echo(\"?>\") ?>"),
            b"echo(\"\") ?>".to_vec()
        );
        assert_eq!(strip_wrapper(b"<?davi ?>"), b"");
        assert_eq!(strip_wrapper(b"\xff<?davi"), b"\xff");
    }

    #[test]
    fn test_render_caret() {
        let message = "parse error at 2:6: expected expression, not )";
        let rendered = render(b"$x = 1\necho()+)", Position::new(2, 6), message);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "-".repeat(message.len()));
        assert_eq!(lines[1], "echo()+)");
        assert_eq!(lines[2], "     ^");
        assert_eq!(lines[3], lines[0]);
        assert_eq!(lines[4], message);
    }

    #[test]
    fn test_render_expands_tabs() {
        let rendered = render(b"\t\t$x + nil", Position::new(1, 6), "boom");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "        $x + nil");
        assert_eq!(lines[2], "           ^");
        assert_eq!(&lines[1][11..12], "+");
    }

    #[test]
    fn test_render_past_end_of_source() {
        let rendered = render(b"echo(", Position::new(3, 1), "oops");
        assert_eq!(rendered, "----\n\n^\n----\noops\n");
    }
}
