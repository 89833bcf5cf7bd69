//! sitemap.xml and robots.txt generation

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::i18n::locales::locale_codes;

/// Pages available under every locale prefix; `""` is the home page.
pub const ROUTES: &[&str] = &["", "/guidance", "/knowledge", "/privacy", "/services", "/terms"];

const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const DISALLOWED_PATHS: &[&str] = &["/private/", "/dashboard/", "/api/"];

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: NaiveDate,
    pub change_frequency: &'static str,
    pub priority: f32,
}

/// One entry per locale and route, locales in table order.
pub fn sitemap_entries(base_url: &str, last_modified: NaiveDate) -> Vec<SitemapEntry> {
    let base_url = base_url.trim_end_matches('/');
    locale_codes()
        .flat_map(|locale| {
            ROUTES.iter().map(move |route| SitemapEntry {
                url: format!("{}/{}{}", base_url, locale, route),
                last_modified,
                change_frequency: "weekly",
                priority: if route.is_empty() { 1.0 } else { 0.8 },
            })
        })
        .collect()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> anyhow::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("urlset").with_attributes([("xmlns", SITEMAP_NAMESPACE)]),
    ))?;
    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", &entry.url)?;
        write_text_element(&mut writer, "lastmod", &entry.last_modified.format("%Y-%m-%d").to_string())?;
        write_text_element(&mut writer, "changefreq", entry.change_frequency)?;
        write_text_element(&mut writer, "priority", &format!("{:.1}", entry.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub fn render_robots(base_url: &str) -> String {
    let mut robots = String::from("User-agent: *\nAllow: /\n");
    for path in DISALLOWED_PATHS {
        robots.push_str(&format!("Disallow: {}\n", path));
    }
    robots.push_str(&format!("\nSitemap: {}/sitemap.xml\n", base_url.trim_end_matches('/')));
    robots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::locales::LOCALES;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_entry_per_locale_and_route() {
        let entries = sitemap_entries("https://localdesk.dk", date());

        assert_eq!(entries.len(), LOCALES.len() * ROUTES.len());
        assert_eq!(entries[0].url, "https://localdesk.dk/en");
        assert_eq!(entries[0].priority, 1.0);
        assert_eq!(entries[1].url, "https://localdesk.dk/en/guidance");
        assert_eq!(entries[1].priority, 0.8);
        assert!(entries.iter().any(|e| e.url == "https://localdesk.dk/ru/terms"));
        assert!(entries.iter().all(|e| e.change_frequency == "weekly"));
    }

    #[test]
    fn test_trailing_slash_in_base_is_ignored() {
        let entries = sitemap_entries("https://localdesk.dk/", date());
        assert_eq!(entries[0].url, "https://localdesk.dk/en");
    }

    #[test]
    fn test_render_sitemap_xml() {
        let xml = render_sitemap(&sitemap_entries("https://localdesk.dk", date())).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<url>").count(), 42);
        assert!(xml.contains("<loc>https://localdesk.dk/da/services</loc>"));
        assert!(xml.contains("<lastmod>2024-05-01</lastmod>"));
        assert!(xml.contains("<priority>1.0</priority>"));
        assert!(xml.contains("<priority>0.8</priority>"));
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_sitemap_escapes_urls() {
        let entries = sitemap_entries("https://example.com/?a=1&b=<2>", date());
        let xml = render_sitemap(&entries[..1]).unwrap();

        assert!(xml.contains("<loc>https://example.com/?a=1&amp;b=&lt;2&gt;/en</loc>"));
        assert_eq!(xml.matches("<url>").count(), 1);
    }

    #[test]
    fn test_render_robots() {
        let robots = render_robots("https://localdesk.dk");

        assert!(robots.starts_with("User-agent: *\nAllow: /\n"));
        assert!(robots.contains("Disallow: /private/\n"));
        assert!(robots.contains("Disallow: /dashboard/\n"));
        assert!(robots.contains("Disallow: /api/\n"));
        assert!(robots.ends_with("Sitemap: https://localdesk.dk/sitemap.xml\n"));
    }
}
