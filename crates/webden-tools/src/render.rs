//! HTML → markdown rendering for page-content tools.

use tracing::debug;

/// Convert page HTML to markdown suitable for an LLM context window.
///
/// Strips chrome elements (nav, header, footer, scripts) to focus on the
/// main content. Falls back to the raw HTML if conversion fails.
pub fn html_to_markdown(html: &str) -> String {
    use htmd::HtmlToMarkdown;

    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe",
        ])
        .build();

    match converter.convert(html) {
        Ok(md) => clean_markdown(&md),
        Err(err) => {
            debug!(error = %err, "html conversion failed; returning raw source");
            html.trim().to_string()
        }
    }
}

/// Collapse runs of blank lines to a single blank line and trim the ends.
fn clean_markdown(md: &str) -> String {
    let mut result = String::with_capacity(md.len());
    let mut pending_blank = false;

    for line in md.lines() {
        if line.trim().is_empty() {
            pending_blank = !result.is_empty();
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
            if pending_blank {
                result.push('\n');
            }
        }
        pending_blank = false;
        result.push_str(line);
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_headings_and_text() {
        let md = html_to_markdown("<html><body><h1>Title</h1><p>Hello world</p></body></html>");
        assert!(md.contains("Title"));
        assert!(md.contains("Hello world"));
        assert!(!md.contains("<h1>"));
    }

    #[test]
    fn test_skips_script_and_nav() {
        let md = html_to_markdown(
            "<html><body><nav>menu</nav><script>alert(1)</script><p>content</p></body></html>",
        );
        assert!(md.contains("content"));
        assert!(!md.contains("menu"));
        assert!(!md.contains("alert"));
    }

    #[test]
    fn test_clean_markdown_collapses_blank_runs() {
        let cleaned = clean_markdown("a\n\n\n\nb\n\nc\n");
        assert_eq!(cleaned, "a\n\nb\n\nc");
    }
}
