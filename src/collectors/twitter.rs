//! Twitter collector.
//!
//! Searches a fixed list of topic keywords for posts since 2023-01-01 and
//! appends `(date, text, username, url)` rows. Results are consumed as a lazy
//! stream so no page is fetched unless a row is still wanted.
//!
//! # Shared cap
//!
//! The cap of [`MAX_TWEETS`] applies to the whole run, not to each keyword:
//! once ten rows have been collected, later keywords contribute nothing.
//!
//! # Search backend
//!
//! [`TwitterScraper`] reads the HTML search pages of a Nitter-compatible
//! frontend anonymously, following the "load more" cursor page by page.

use crate::models::{CollectorReport, MicroPost, Row, SourceOutcome};
use crate::sink::{SinkConnector, deliver};
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use futures::future::Either;
use futures::stream::{self, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::pin::pin;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub const COLLECTOR: &str = "twitter";
pub const KEYWORDS: [&str; 5] = ["UFO", "aliens", "paranormal", "telekinesis", "zero-point energy"];
pub const SINCE: &str = "2023-01-01";
/// Total rows collected across all keywords.
pub const MAX_TWEETS: usize = 10;

pub const DEFAULT_SEARCH_BASE: &str = "https://nitter.net";

/// A microblog search returning posts lazily, most recent first.
pub trait MicroblogSearch {
    fn search<'a>(&'a self, query: &'a str) -> impl Stream<Item = Result<MicroPost, Box<dyn Error>>> + 'a;
}

/// `"<keyword> since:2023-01-01"`
pub fn search_query(keyword: &str) -> String {
    format!("{keyword} since:{SINCE}")
}

static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse(".timeline-item").expect("static selector"));
static TWEET_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.tweet-link").expect("static selector"));
static USERNAME: Lazy<Selector> = Lazy::new(|| Selector::parse("a.username").expect("static selector"));
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse(".tweet-date a[title]").expect("static selector"));
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse(".tweet-content").expect("static selector"));
static SHOW_MORE: Lazy<Selector> = Lazy::new(|| Selector::parse(".show-more a[href]").expect("static selector"));
static STATUS_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/([^/]+)/status/(\d+)").expect("static regex"));

/// One parsed page of search results.
#[derive(Debug, Default)]
pub struct SearchPage {
    pub posts: Vec<MicroPost>,
    pub cursor: Option<String>,
}

/// Parse a search results page. Entries that don't look like posts are skipped.
pub fn parse_search_page(html: &str, base: &Url) -> SearchPage {
    let document = Html::parse_document(html);

    let posts = document
        .select(&ITEM)
        .filter_map(|item| match parse_item(item) {
            Some(post) => Some(post),
            None => {
                debug!("Skipping timeline item without post data");
                None
            }
        })
        .collect();

    let cursor = document
        .select(&SHOW_MORE)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .find_map(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "cursor")
                .map(|(_, v)| v.into_owned())
        });

    SearchPage { posts, cursor }
}

fn parse_item(item: ElementRef<'_>) -> Option<MicroPost> {
    let href = item.select(&TWEET_LINK).next()?.value().attr("href")?;
    let caps = STATUS_PATH.captures(href)?;
    let (path_user, id) = (&caps[1], &caps[2]);

    let username = item
        .select(&USERNAME)
        .next()
        .map(|u| u.text().collect::<String>().trim().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| path_user.to_string());

    // e.g. "Jan 5, 2023 · 3:04 PM UTC"
    let title = item.select(&DATE).next()?.value().attr("title")?;
    let day = title.split('·').next()?.trim();
    let date = NaiveDate::parse_from_str(day, "%b %d, %Y").ok()?;

    let content = item
        .select(&CONTENT)
        .next()
        .map(|c| c.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    Some(MicroPost {
        date,
        content,
        username,
        url: format!("https://twitter.com/{path_user}/status/{id}"),
    })
}

/// Anonymous search against a Nitter-compatible frontend.
#[derive(Debug, Clone)]
pub struct TwitterScraper {
    http: Client,
    base_url: Url,
}

impl TwitterScraper {
    /// `base_url` may carry a path, e.g. `https://host/nitter`; requests go below it.
    pub fn new(base_url: &str) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let dir = format!("{}/", base_url.path());
            base_url.set_path(&dir);
        }
        Ok(Self { http, base_url })
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, query: &str, cursor: Option<&str>) -> Result<SearchPage, Box<dyn Error>> {
        let mut url = self.base_url.join("search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("f", "tweets").append_pair("q", query);
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
        }

        let html = self.http.get(url).send().await?.error_for_status()?.text().await?;
        let page = parse_search_page(&html, &self.base_url);
        debug!(posts = page.posts.len(), has_more = page.cursor.is_some(), "Fetched search page");
        Ok(page)
    }
}

impl MicroblogSearch for TwitterScraper {
    fn search<'a>(&'a self, query: &'a str) -> impl Stream<Item = Result<MicroPost, Box<dyn Error>>> + 'a {
        // State: None once finished, Some(cursor) for the next page to fetch.
        stream::unfold(Some(None::<String>), move |state| async move {
            let cursor = state?;
            match self.fetch_page(query, cursor.as_deref()).await {
                Ok(page) => {
                    let next = if page.posts.is_empty() { None } else { page.cursor.map(Some) };
                    let items: Vec<Result<MicroPost, Box<dyn Error>>> = page.posts.into_iter().map(Ok).collect();
                    Some((stream::iter(items), next))
                }
                Err(e) => Some((stream::iter(vec![Err(e)]), None)),
            }
        })
        .flatten()
    }
}

/// A search client, or the reason one could not be built.
#[derive(Debug)]
pub enum TwitterSource {
    Ready(TwitterScraper),
    Unavailable(String),
}

impl TwitterSource {
    /// Build the scraper, logging (not propagating) construction failures.
    pub fn build(base_url: &str) -> Self {
        match TwitterScraper::new(base_url) {
            Ok(scraper) => TwitterSource::Ready(scraper),
            Err(e) => {
                error!(%base_url, error = %e, "Error initializing Twitter search");
                TwitterSource::Unavailable(e.to_string())
            }
        }
    }
}

impl MicroblogSearch for TwitterSource {
    fn search<'a>(&'a self, query: &'a str) -> impl Stream<Item = Result<MicroPost, Box<dyn Error>>> + 'a {
        match self {
            TwitterSource::Ready(scraper) => Either::Left(scraper.search(query)),
            TwitterSource::Unavailable(reason) => {
                let err: Box<dyn Error> = format!("Twitter search unavailable: {reason}").into();
                Either::Right(stream::iter([Err::<MicroPost, _>(err)]))
            }
        }
    }
}

/// Search every keyword in order until `cap` rows have been collected in total.
///
/// A stream error ends that keyword; rows it already yielded are kept.
pub async fn gather<S: MicroblogSearch>(
    search: &S,
    keywords: &[&str],
    cap: usize,
) -> (Vec<Row>, Vec<(String, SourceOutcome)>) {
    let mut rows: Vec<Row> = Vec::new();
    let mut outcomes = Vec::with_capacity(keywords.len());

    for keyword in keywords {
        if rows.len() >= cap {
            debug!(%keyword, cap, "Cap reached; not searching");
            outcomes.push((keyword.to_string(), SourceOutcome::Empty));
            continue;
        }

        info!(%keyword, "Searching Twitter");
        let query = search_query(keyword);
        let before = rows.len();
        let mut failure = None;

        let mut results = pin!(search.search(&query));
        while rows.len() < cap {
            match results.next().await {
                Some(Ok(post)) => {
                    debug!(%keyword, text = %truncate_for_log(&post.content, 80), "Matched post");
                    rows.push(post.to_row());
                }
                Some(Err(e)) => {
                    error!(%keyword, error = %e, "Error scraping Twitter");
                    failure = Some(e.to_string());
                    break;
                }
                None => break,
            }
        }

        let taken = rows.len() - before;
        if failure.is_some() && taken > 0 {
            warn!(%keyword, kept = taken, "Keeping rows collected before the error");
        }
        let outcome = match failure {
            Some(e) => SourceOutcome::Failed(e),
            None => SourceOutcome::from_count(taken),
        };
        outcomes.push((keyword.to_string(), outcome));
    }

    (rows, outcomes)
}

/// Run the Twitter collector end to end.
#[instrument(level = "info", skip_all, fields(keywords = keywords.len()))]
pub async fn collect<S: MicroblogSearch, C: SinkConnector>(
    search: &S,
    keywords: &[&str],
    connector: &C,
) -> CollectorReport {
    let (rows, outcomes) = gather(search, keywords, MAX_TWEETS).await;
    let delivery = deliver(connector, COLLECTOR, &rows).await;
    CollectorReport {
        collector: COLLECTOR,
        outcomes,
        rows: rows.len(),
        delivery,
    }
}
