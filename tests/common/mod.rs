//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use sitemap_stream::SitemapError;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Build a `<urlset>` with one `<url>` per location.
pub fn urlset<S: AsRef<str>>(locations: &[S]) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="{SITEMAP_NS}">"#);
    for location in locations {
        xml.push_str(&format!(
            "\n  <url><loc>{}</loc><changefreq>daily</changefreq></url>",
            location.as_ref()
        ));
    }
    xml.push_str("\n</urlset>");
    xml
}

/// `https://example.com/page/1` .. `https://example.com/page/{count}`
pub fn page_locations(count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("https://example.com/page/{n}"))
        .collect()
}

/// Build a `<sitemapindex>` with one `<sitemap>` per location.
pub fn sitemap_index<S: AsRef<str>>(locations: &[S]) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="{SITEMAP_NS}">"#);
    for location in locations {
        xml.push_str(&format!(
            "\n  <sitemap><loc>{}</loc><lastmod>2024-02-01</lastmod></sitemap>",
            location.as_ref()
        ));
    }
    xml.push_str("\n</sitemapindex>");
    xml
}

/// Consumer error type used to check that caller errors come back unchanged.
#[derive(Debug)]
pub enum CrawlError {
    Stop(usize),
    Sitemap(SitemapError),
}

impl From<SitemapError> for CrawlError {
    fn from(err: SitemapError) -> Self {
        CrawlError::Sitemap(err)
    }
}
