//! Assembles a post page from a [`PageLayout`] and a [`GeneratedPost`].

use crate::layout::PageLayout;
use crate::post::GeneratedPost;
use pulldown_cmark::escape::escape_html;

/// Average reading speed used for the reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

/// Builds the full page text. Title, description, and social copy are
/// escaped; `post.content_html` is inserted as-is.
///
/// The title element and the `title`/`description` meta tags in the header
/// are rewritten in place. A placeholder the header doesn't have is skipped.
pub fn assemble(layout: &PageLayout, post: &GeneratedPost, site_name: &str) -> String {
    let title = escape(&post.title);
    let description = escape(&post.description);

    let mut header = replace_element(
        &layout.header,
        "<title>",
        "</title>",
        &format!("{} | {}", title, escape(site_name)),
    );
    header = replace_attribute(&header, r#"<meta name="title" content=""#, &title);
    header = replace_attribute(&header, r#"<meta name="description" content=""#, &description);

    let mut page = String::with_capacity(
        header.len() + post.content_html.len() + layout.footer.len() + 1024,
    );
    page.push_str(&header);
    page.push_str(&format!(
        "\n            <h1 class=\"section-title\">{}</h1>",
        title
    ));
    page.push_str(&format!(
        "\n            <p style=\"opacity: 0.9; margin-bottom: 3rem; font-size: 1.1rem;\">⏱️ {} min read</p>",
        reading_time(&post.content_html)
    ));
    page.push_str("\n            <div class=\"article-body\">\n");
    page.push_str(&post.content_html);
    page.push('\n');
    page.push_str(&format!(
        r#"
                <hr style="margin: 3rem 0 2rem; border: 0; border-top: 1px solid rgba(255,255,255,0.2);">
                <div class="social-footnote" style="font-size: 0.85rem; opacity: 0.8; line-height: 1.4;">
                    <p><strong>Social Media Poster Text:</strong><br>{}</p>
                    <p style="margin-top: 1rem;"><strong>Social Media Caption:</strong><br>{}</p>
                </div>
            </div>"#,
        escape(&post.social_poster_text),
        escape(&post.social_caption),
    ));
    page.push_str(&layout.footer);
    page
}

/// Estimated minutes to read `content`: whitespace-delimited tokens divided
/// by [`WORDS_PER_MINUTE`], rounded half-to-even, never less than one.
pub fn reading_time(content: &str) -> usize {
    let words = content.split_whitespace().count();
    let minutes = words / WORDS_PER_MINUTE;
    let rest = words % WORDS_PER_MINUTE;
    let half = WORDS_PER_MINUTE / 2;
    let rounded = if rest > half || (rest == half && minutes % 2 == 1) {
        minutes + 1
    } else {
        minutes
    };
    rounded.max(1)
}

/// HTML-escapes `s` for use in text nodes and double-quoted attributes.
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    // Writing into a `String` can't fail.
    let _ = escape_html(&mut escaped, s);
    escaped
}

/// Replaces the text between the first `open` and the next `close` with
/// `content`.
fn replace_element(html: &str, open: &str, close: &str, content: &str) -> String {
    let start = match html.find(open) {
        Some(i) => i + open.len(),
        None => return html.to_owned(),
    };
    match html[start..].find(close) {
        Some(len) => splice(html, start, start + len, content),
        None => html.to_owned(),
    }
}

/// Replaces the attribute value that starts right after the first `prefix`
/// (which must end with the opening quote) with `value`.
fn replace_attribute(html: &str, prefix: &str, value: &str) -> String {
    replace_element(html, prefix, "\"", value)
}

fn splice(html: &str, start: usize, stop: usize, content: &str) -> String {
    let mut out = String::with_capacity(html.len() - (stop - start) + content.len());
    out.push_str(&html[..start]);
    out.push_str(content);
    out.push_str(&html[stop..]);
    out
}
