//! News site collector.
//!
//! Fetches each configured site's front page once and pulls a headline and a
//! link out of the first five `<article>` blocks, producing
//! `(heading, link, site)` rows.

use crate::models::{CollectorReport, Headline, Row, SourceOutcome};
use crate::sink::{SinkConnector, deliver};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub const COLLECTOR: &str = "news";
/// Article blocks considered per page.
pub const ARTICLES_PER_SITE: usize = 5;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").expect("static selector"));
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("static selector"));
static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("static selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Retrieves a page body.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// Plain GET with a request timeout. The status code is not checked.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let resp = self.http.get(url).send().await?;
        debug!(status = %resp.status(), "Fetched page");
        Ok(resp.text().await?)
    }
}

/// A page fetcher, or the reason one could not be built.
#[derive(Debug)]
pub enum NewsSource {
    Ready(HttpFetcher),
    Unavailable(String),
}

impl NewsSource {
    /// Build the HTTP client, logging (not propagating) construction failures.
    pub fn build() -> Self {
        match HttpFetcher::new() {
            Ok(fetcher) => NewsSource::Ready(fetcher),
            Err(e) => {
                error!(error = %e, "Error initializing news fetcher");
                NewsSource::Unavailable(e.to_string())
            }
        }
    }
}

impl PageFetcher for NewsSource {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        match self {
            NewsSource::Ready(fetcher) => fetcher.fetch(url).await,
            NewsSource::Unavailable(reason) => Err(format!("news fetcher unavailable: {reason}").into()),
        }
    }
}

fn heading_of(article: ElementRef<'_>) -> Option<ElementRef<'_>> {
    article
        .select(&H2)
        .next()
        .or_else(|| article.select(&H3).next())
        .or_else(|| article.select(&ANCHOR).next())
}

fn link_of<'a>(article: ElementRef<'a>) -> Option<&'a str> {
    article
        .select(&LINK)
        .find_map(|a| a.value().attr("href").filter(|href| !href.is_empty()))
}

/// Extract headlines from the first [`ARTICLES_PER_SITE`] `<article>` blocks.
///
/// Heading is the first `h2`, else `h3`, else `a`; the link is the first
/// anchor with a non-empty `href`. Blocks missing either are skipped.
pub fn extract_headlines(html: &str, site: &str) -> Vec<Headline> {
    let document = Html::parse_document(html);

    document
        .select(&ARTICLE)
        .take(ARTICLES_PER_SITE)
        .filter_map(|article| {
            let heading = heading_of(article)?;
            let link = link_of(article)?;
            Some(Headline {
                heading: heading.text().collect::<String>().trim().to_string(),
                link: link.to_string(),
                site: site.to_string(),
            })
        })
        .collect()
}

/// Visit every site in order and return the rows plus per-site outcomes.
pub async fn gather<F: PageFetcher>(fetcher: &F, sites: &[String]) -> (Vec<Row>, Vec<(String, SourceOutcome)>) {
    let mut rows = Vec::new();
    let mut outcomes = Vec::with_capacity(sites.len());

    for site in sites {
        info!(%site, "Scraping news site");
        match fetcher.fetch(site).await {
            Ok(html) => {
                let headlines = extract_headlines(&html, site);
                debug!(%site, count = headlines.len(), "Extracted headlines");
                rows.extend(headlines.iter().map(Headline::to_row));
                outcomes.push((site.clone(), SourceOutcome::from_count(headlines.len())));
            }
            Err(e) => {
                error!(%site, error = %e, "Error scraping news site");
                outcomes.push((site.clone(), SourceOutcome::Failed(e.to_string())));
            }
        }
    }

    (rows, outcomes)
}

/// Run the news collector end to end.
#[instrument(level = "info", skip_all, fields(sites = sites.len()))]
pub async fn collect<F: PageFetcher, C: SinkConnector>(fetcher: &F, sites: &[String], connector: &C) -> CollectorReport {
    let (rows, outcomes) = gather(fetcher, sites).await;
    let delivery = deliver(connector, COLLECTOR, &rows).await;
    CollectorReport {
        collector: COLLECTOR,
        outcomes,
        rows: rows.len(),
        delivery,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned pages; unknown URLs time out.
    #[derive(Debug, Default)]
    pub struct FakeFetcher {
        pub pages: HashMap<String, String>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| format!("operation timed out: {url}").into())
        }
    }
}
