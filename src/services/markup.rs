//! Renderer for the constrained line-oriented email markup dialect.
//!
//! `H1: text` / `H2: text` lines become styled headings, everything else a
//! styled paragraph; blank lines separate paragraphs. Already-rendered
//! `<h1>`/`<h2>` lines are normalized to the same headings. Unknown markup is
//! never an error — it degrades to an ordinary paragraph.
//!
//! Rendering is deterministic: same input + same options gives byte-identical
//! output.

use crate::defaults::UNSUBSCRIBE_URL_TOKEN;

const H1_STYLE: &str =
    "color: #1a1a2e; font-family: Georgia, serif; font-size: 28px; margin: 24px 0 12px 0;";
const H2_STYLE: &str =
    "color: #1a1a2e; font-family: Georgia, serif; font-size: 21px; margin: 20px 0 10px 0;";
const P_STYLE: &str =
    "color: #333333; font-size: 15px; line-height: 1.6; margin: 0 0 16px 0;";

/// Options for the fixed outer email shell
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// Header image URL; the image block is emitted only when non-empty
    pub header_image: Option<String>,
    /// Suppress the unsubscribe footer link (transactional mail)
    pub suppress_unsubscribe: bool,
}

/// Render the markup body to a concatenated list of styled HTML fragments,
/// preserving line order.
pub fn render_fragments(markup: &str) -> String {
    let mut out = String::new();

    for line in markup.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(text) = heading_text(line, 1) {
            out.push_str(&format!("<h1 style=\"{H1_STYLE}\">{text}</h1>\n"));
        } else if let Some(text) = heading_text(line, 2) {
            out.push_str(&format!("<h2 style=\"{H2_STYLE}\">{text}</h2>\n"));
        } else {
            let text = strip_tags(line);
            out.push_str(&format!("<p style=\"{P_STYLE}\">{text}</p>\n"));
        }
    }

    out
}

/// Wrap rendered fragments in the fixed shell: accent bar, optional header
/// image, content area, signature, footer with wordmark and unsubscribe link.
///
/// The unsubscribe link URL is the deferred `{UNSUBSCRIBE_URL}` token; the
/// dispatcher substitutes a per-recipient address before sending.
pub fn render_document(fragments: &str, opts: &ShellOptions) -> String {
    let mut html = String::new();

    html.push_str(
        "<!DOCTYPE html>\n<html>\n<body style=\"margin: 0; padding: 0; background-color: #f4f4f4;\">\n",
    );
    html.push_str(
        "<div style=\"max-width: 600px; margin: 0 auto; background-color: #ffffff; font-family: Arial, Helvetica, sans-serif;\">\n",
    );

    // Top accent bar
    html.push_str("<div style=\"height: 6px; background-color: #c0392b;\"></div>\n");

    // Optional header image
    if let Some(image) = opts.header_image.as_deref() {
        if !image.is_empty() {
            html.push_str(&format!(
                "<img src=\"{image}\" alt=\"\" style=\"display: block; width: 100%; height: auto;\" />\n"
            ));
        }
    }

    // Content area
    html.push_str("<div style=\"padding: 32px 40px;\">\n");
    html.push_str(fragments);
    html.push_str("</div>\n");

    // Signature
    html.push_str(
        "<div style=\"padding: 0 40px 24px 40px; color: #555555; font-size: 14px;\">\
         Med vänliga hälsningar,<br />Utskick</div>\n",
    );

    // Footer
    html.push_str(
        "<div style=\"padding: 20px 40px; background-color: #1a1a2e; color: #aaaaaa; font-size: 12px; text-align: center;\">\n",
    );
    html.push_str("<div style=\"font-family: Georgia, serif; font-size: 16px; color: #ffffff; margin-bottom: 8px;\">UTSKICK</div>\n");
    if !opts.suppress_unsubscribe {
        html.push_str(&format!(
            "<a href=\"{UNSUBSCRIBE_URL_TOKEN}\" style=\"color: #aaaaaa;\">Avregistrera dig fr&aring;n utskick</a>\n"
        ));
    }
    html.push_str("</div>\n");

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Render the full email HTML for a markup body
pub fn render_email(markup: &str, opts: &ShellOptions) -> String {
    render_document(&render_fragments(markup), opts)
}

/// Plain-text alternative: heading prefixes dropped, tags stripped,
/// paragraphs separated by blank lines.
pub fn render_plain_text(markup: &str) -> String {
    let mut parts = Vec::new();

    for line in markup.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let text = if let Some(text) = heading_text(line, 1) {
            text
        } else if let Some(text) = heading_text(line, 2) {
            text
        } else {
            strip_tags(line)
        };

        if !text.is_empty() {
            parts.push(text);
        }
    }

    parts.join("\n\n")
}

/// Extract heading text when `line` is `H<level>: text` or an
/// `<h<level>>` tag, case-insensitive. Returns the tag-stripped remainder.
fn heading_text(line: &str, level: u8) -> Option<String> {
    let prefix = format!("h{level}:");
    let tag = format!("<h{level}");

    let lower = line.to_ascii_lowercase();
    if lower.starts_with(&prefix) {
        return Some(strip_tags(line[prefix.len()..].trim()));
    }
    if lower.starts_with(&tag) {
        return Some(strip_tags(line).trim().to_string());
    }
    None
}

/// Remove `<...>` tag sequences; never escapes, so already-rendered
/// fragments are not double-escaped.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h1_line_becomes_heading() {
        let html = render_fragments("H1: Tack");
        assert!(html.contains("<h1"));
        assert!(html.contains(">Tack</h1>"));
    }

    #[test]
    fn h2_line_becomes_subheading() {
        let html = render_fragments("H2: Praktisk information");
        assert!(html.contains("<h2"));
        assert!(html.contains(">Praktisk information</h2>"));
    }

    #[test]
    fn heading_prefix_is_case_insensitive() {
        let html = render_fragments("h1: Tack");
        assert!(html.contains(">Tack</h1>"));
    }

    #[test]
    fn html_heading_tags_are_normalized() {
        let html = render_fragments("<h1>Tack</h1>");
        assert!(html.contains("<h1 style="));
        assert!(html.contains(">Tack</h1>"));
    }

    #[test]
    fn plain_line_becomes_paragraph() {
        let html = render_fragments("Hej Anna!");
        assert!(html.contains("<p style="));
        assert!(html.contains(">Hej Anna!</p>"));
    }

    #[test]
    fn blank_lines_separate_paragraphs_and_are_skipped() {
        let html = render_fragments("Första stycket\n\nAndra stycket");
        assert_eq!(html.matches("<p style=").count(), 2);
    }

    #[test]
    fn fragment_order_is_preserved() {
        let html = render_fragments("H1: Tack\n\nHej Anna!\n\nH2: Info\n\nKursen startar.");
        let h1 = html.find(">Tack<").unwrap();
        let p1 = html.find(">Hej Anna!<").unwrap();
        let h2 = html.find(">Info<").unwrap();
        let p2 = html.find(">Kursen startar.<").unwrap();
        assert!(h1 < p1 && p1 < h2 && h2 < p2);
    }

    #[test]
    fn stray_tags_are_stripped_not_double_escaped() {
        let html = render_fragments("Hej <b>Anna</b>!");
        assert!(html.contains(">Hej Anna!</p>"));
        assert!(!html.contains("&lt;"));
    }

    #[test]
    fn unknown_markup_degrades_to_paragraph() {
        let html = render_fragments("H3: inte ett känt prefix");
        assert!(html.contains("<p style="));
        assert!(html.contains("H3: inte ett känt prefix"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let opts = ShellOptions::default();
        let a = render_email("H1: Tack\n\nHej {NAMN}!", &opts);
        let b = render_email("H1: Tack\n\nHej {NAMN}!", &opts);
        assert_eq!(a, b);
    }

    #[test]
    fn shell_contains_accent_bar_signature_and_footer() {
        let html = render_email("Hej!", &ShellOptions::default());
        assert!(html.contains("height: 6px"));
        assert!(html.contains("Med vänliga hälsningar"));
        assert!(html.contains("UTSKICK"));
    }

    #[test]
    fn header_image_block_only_when_reference_non_empty() {
        let without = render_email("Hej!", &ShellOptions::default());
        assert!(!without.contains("<img"));

        let with = render_email(
            "Hej!",
            &ShellOptions {
                header_image: Some("https://example.com/banner.jpg".into()),
                suppress_unsubscribe: false,
            },
        );
        assert!(with.contains("https://example.com/banner.jpg"));

        let empty = render_email(
            "Hej!",
            &ShellOptions {
                header_image: Some(String::new()),
                suppress_unsubscribe: false,
            },
        );
        assert!(!empty.contains("<img"));
    }

    #[test]
    fn unsubscribe_token_appears_exactly_once_when_enabled() {
        let html = render_email("Hej!", &ShellOptions::default());
        assert_eq!(html.matches(UNSUBSCRIBE_URL_TOKEN).count(), 1);
    }

    #[test]
    fn unsubscribe_token_absent_when_suppressed() {
        let html = render_email(
            "Hej!",
            &ShellOptions {
                header_image: None,
                suppress_unsubscribe: true,
            },
        );
        assert!(!html.contains(UNSUBSCRIBE_URL_TOKEN));
    }

    #[test]
    fn plain_text_drops_prefixes_and_tags() {
        let text = render_plain_text("H1: Tack\n\nHej <b>Anna</b>!");
        assert_eq!(text, "Tack\n\nHej Anna!");
    }

    #[test]
    fn end_to_end_course_confirmation_scenario() {
        use crate::services::variables;
        use std::collections::HashMap;

        let content = "H1: Tack\n\nHej {NAMN}!";
        let mut vars = HashMap::new();
        vars.insert("NAMN".to_string(), "Anna".to_string());

        let personalized = variables::resolve(content, &vars);
        let html = render_fragments(&personalized);

        let heading = html.find(">Tack</h1>").unwrap();
        let paragraph = html.find(">Hej Anna!</p>").unwrap();
        assert!(heading < paragraph);
    }
}
