//! Static SEO artifacts
pub mod sitemap;

pub use sitemap::{render_robots, render_sitemap, sitemap_entries, SitemapEntry, ROUTES};
