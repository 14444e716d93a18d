//! Appends `<url>` entries to a sitemap-protocol XML document.
//!
//! The sitemap is edited as text rather than re-serialized, so everything
//! outside the inserted block stays byte-for-byte identical.

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};
use url::Url;

/// The closing tag new entries are inserted in front of.
pub const CLOSING_TAG: &str = "</urlset>";

/// The priority given to new post pages.
pub const DEFAULT_PRIORITY: f32 = 0.8;

/// One `<url>` block.
#[derive(Clone, Debug, PartialEq)]
pub struct SitemapEntry {
    pub loc: Url,
    pub lastmod: NaiveDate,
    pub priority: f32,
}

impl SitemapEntry {
    /// Renders the entry as a two-space-indented `<url>` block, including the
    /// trailing newline.
    pub fn to_xml(&self) -> String {
        format!(
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <priority>{:.2}</priority>\n  </url>\n",
            quick_xml::escape::escape(self.loc.as_str()),
            self.lastmod.format("%Y-%m-%d"),
            self.priority,
        )
    }
}

/// Returns `sitemap` with `entry` inserted immediately before the closing
/// `</urlset>` tag, or `None` if there is no closing tag.
pub fn insert(sitemap: &str, entry: &SitemapEntry) -> Option<String> {
    let at = sitemap.rfind(CLOSING_TAG)?;

    if locs(sitemap).iter().any(|loc| loc == entry.loc.as_str()) {
        warn!(loc = %entry.loc, "sitemap already lists this URL; adding another entry");
    }

    let block = entry.to_xml();
    let mut out = String::with_capacity(sitemap.len() + block.len());
    out.push_str(&sitemap[..at]);
    out.push_str(&block);
    out.push_str(&sitemap[at..]);
    Some(out)
}

/// Lists every `<loc>` inside a `<url>` block. Parsing stops quietly at the
/// first malformed element since this is only used for diagnostics.
pub fn locs(sitemap: &str) -> Vec<String> {
    let mut reader = Reader::from_str(sitemap);
    let mut locs = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => in_loc = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_loc => match e.unescape() {
                Ok(text) => locs.push(text.trim().to_owned()),
                Err(err) => {
                    debug!(error = %err, "unreadable <loc> in sitemap");
                    break;
                }
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"loc" => in_loc = false,
                b"url" => in_url = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                debug!(error = %err, "stopped scanning malformed sitemap");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    locs
}

#[cfg(test)]
mod test {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://stampcircle.com/</loc>
    <lastmod>2025-01-01</lastmod>
    <priority>1.00</priority>
  </url>
</urlset>
"#;

    fn entry(slug: &str) -> SitemapEntry {
        SitemapEntry {
            loc: Url::parse(&format!("https://stampcircle.com/blog/{}.html", slug)).unwrap(),
            lastmod: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            priority: DEFAULT_PRIORITY,
        }
    }

    #[test]
    fn test_entry_xml() {
        assert_eq!(
            "  <url>\n    <loc>https://stampcircle.com/blog/5-tips.html</loc>\n    <lastmod>2026-10-16</lastmod>\n    <priority>0.80</priority>\n  </url>\n",
            entry("5-tips").to_xml()
        );
    }

    #[test]
    fn test_insert_before_closing_tag() {
        let updated = insert(SITEMAP, &entry("5-tips")).unwrap();
        assert_eq!(
            SITEMAP.matches("<url>").count() + 1,
            updated.matches("<url>").count()
        );

        let at = SITEMAP.rfind(CLOSING_TAG).unwrap();
        let block = entry("5-tips").to_xml();
        assert_eq!(&SITEMAP[..at], &updated[..at]);
        assert_eq!(block, &updated[at..at + block.len()]);
        assert_eq!(&SITEMAP[at..], &updated[at + block.len()..]);
    }

    #[test]
    fn test_missing_closing_tag() {
        assert_eq!(None, insert("<urlset>", &entry("5-tips")));
        assert_eq!(None, insert("", &entry("5-tips")));
    }

    #[test]
    fn test_locs() {
        let updated = insert(SITEMAP, &entry("5-tips")).unwrap();
        assert_eq!(
            vec![
                "https://stampcircle.com/".to_owned(),
                "https://stampcircle.com/blog/5-tips.html".to_owned(),
            ],
            locs(&updated)
        );
    }

    #[test]
    fn test_duplicate_loc_still_inserted() {
        let once = insert(SITEMAP, &entry("5-tips")).unwrap();
        let twice = insert(&once, &entry("5-tips")).unwrap();
        assert_eq!(2, locs(&twice).iter().filter(|l| l.ends_with("5-tips.html")).count());
    }

    #[test]
    fn test_loc_is_escaped() {
        let mut entry = entry("x");
        entry.loc = Url::parse("https://example.org/blog/a.html?x=1&y=2").unwrap();
        assert!(entry.to_xml().contains("<loc>https://example.org/blog/a.html?x=1&amp;y=2</loc>"));
    }
}
