//! Managed-block rewriting for the PICO-8 HTML shell.
//!
//! Generated tags live between `<!-- hnp:begin NAME -->` and
//! `<!-- hnp:end NAME -->` comments so later runs can find and replace
//! them. Everything outside the markers is left untouched.

use crate::GenerationError;

pub(crate) const PROTOCOL_BLOCK: &str = "protocol";
pub(crate) const DEBUGGER_BLOCK: &str = "debugger";

fn begin_marker(name: &str) -> String {
    format!("<!-- hnp:begin {name} -->")
}

fn end_marker(name: &str) -> String {
    format!("<!-- hnp:end {name} -->")
}

/// Removes every block called `name`, including the marker lines.
pub(crate) fn strip_block(html: &str, name: &'static str) -> Result<String, GenerationError> {
    let begin = begin_marker(name);
    let end = end_marker(name);
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find(&begin) {
        let after_begin = &rest[start..];
        let stop = after_begin
            .find(&end)
            .ok_or(GenerationError::MalformedHtml(name))?
            + end.len();

        // Drop the indentation in front of the begin marker.
        let head = &rest[..start];
        let line_start = head.rfind('\n').map_or(0, |i| i + 1);
        if head[line_start..].chars().all(|c| c == ' ' || c == '\t') {
            out.push_str(&head[..line_start]);
        } else {
            out.push_str(head);
        }

        let mut tail = &after_begin[stop..];
        tail = tail.strip_prefix("\r\n").or_else(|| tail.strip_prefix('\n')).unwrap_or(tail);
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

/// Inserts a block right before `</body>`, or at the end if there is none.
pub(crate) fn insert_block(html: &str, name: &str, content: &str) -> String {
    let mut block = String::new();
    block.push_str(&begin_marker(name));
    block.push('\n');
    block.push_str(content);
    if !content.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(&end_marker(name));
    block.push('\n');

    match find_ignore_case(html, "</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + block.len());
            out.push_str(&html[..at]);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out.push_str(&html[at..]);
            out
        }
        None => {
            let mut out = html.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out
        }
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .rposition(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHELL: &str = "<html>\n<body>\n<canvas></canvas>\n</body>\n</html>\n";

    #[test]
    fn test_insert_before_body_close() {
        let html = insert_block(SHELL, "protocol", "<script></script>");
        assert_eq!(
            html,
            "<html>\n<body>\n<canvas></canvas>\n\
             <!-- hnp:begin protocol -->\n<script></script>\n<!-- hnp:end protocol -->\n\
             </body>\n</html>\n"
        );
    }

    #[test]
    fn test_strip_restores_original() {
        let html = insert_block(SHELL, "protocol", "<script></script>");
        assert_eq!(strip_block(&html, PROTOCOL_BLOCK).unwrap(), SHELL);
    }

    #[test]
    fn test_strip_handles_indented_and_repeated_blocks() {
        let html = "<body>\n  <!-- hnp:begin debugger -->\n  x\n  <!-- hnp:end debugger -->\n\
                    <p>keep</p>\n<!-- hnp:begin debugger -->y<!-- hnp:end debugger -->\n</body>";
        assert_eq!(
            strip_block(html, DEBUGGER_BLOCK).unwrap(),
            "<body>\n<p>keep</p>\n</body>"
        );
    }

    #[test]
    fn test_strip_leaves_other_blocks() {
        let html = insert_block(SHELL, "protocol", "a");
        let html = insert_block(&html, "debugger", "b");
        let stripped = strip_block(&html, DEBUGGER_BLOCK).unwrap();
        assert!(stripped.contains("hnp:begin protocol"));
        assert!(!stripped.contains("hnp:begin debugger"));
    }

    #[test]
    fn test_unterminated_block() {
        let err = strip_block("<!-- hnp:begin protocol -->", PROTOCOL_BLOCK).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedHtml("protocol")));
    }

    #[test]
    fn test_insert_without_body_appends() {
        assert_eq!(
            insert_block("<p>hi</p>", "protocol", "x\n"),
            "<p>hi</p>\n<!-- hnp:begin protocol -->\nx\n<!-- hnp:end protocol -->\n"
        );
    }

    #[test]
    fn test_body_close_is_case_insensitive() {
        let html = insert_block("<BODY></BODY>", "protocol", "x");
        assert!(html.ends_with("<!-- hnp:end protocol -->\n</BODY>"));
    }
}
