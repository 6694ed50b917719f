//! Reddit collector.
//!
//! For every configured subreddit the ten newest posts are fetched and turned
//! into `(title, url, score, comments, subreddit)` rows. All rows are appended
//! to a freshly opened sink in one batch once every subreddit was visited.
//!
//! # Client
//!
//! [`RedditClient`] talks to the OAuth API with a script-app password grant.
//! The token is requested lazily on the first listing call and reused for the
//! rest of the run. If the client cannot be built (missing credentials) the
//! collector still runs against [`RedditSource::Unavailable`], which fails
//! every call with the construction error.

use crate::models::{CollectorReport, DiscussionPost, Row, SourceOutcome};
use crate::sink::{SinkConnector, deliver};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

pub const COLLECTOR: &str = "reddit";
/// Posts fetched per subreddit.
pub const POSTS_PER_COMMUNITY: usize = 10;

pub const DEFAULT_AUTH_BASE: &str = "https://www.reddit.com";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";

/// Something that lists the newest posts of a community.
pub trait DiscussionSource {
    async fn newest(&self, community: &str, limit: usize) -> Result<Vec<DiscussionPost>, Box<dyn Error>>;
}

/// Script-app credentials.
#[derive(Debug, Clone, Default)]
pub struct RedditCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, Box<dyn Error>> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing Reddit setting: {name}").into())
}

pub struct RedditClient {
    http: Client,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    auth_base: String,
    api_base: String,
    token: OnceCell<String>,
}

impl std::fmt::Debug for RedditClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditClient")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
}

impl PostData {
    fn into_post(self) -> DiscussionPost {
        let url = match self.url {
            Some(url) if !url.is_empty() => url,
            _ => format!("https://www.reddit.com{}", self.permalink),
        };
        DiscussionPost {
            title: self.title,
            url,
            score: self.score,
            num_comments: self.num_comments,
        }
    }
}

impl RedditClient {
    /// Build a client. Fails if any credential is missing.
    pub fn new(creds: &RedditCredentials) -> Result<Self, Box<dyn Error>> {
        let user_agent = required(&creds.user_agent, "user agent")?;
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            http,
            client_id: required(&creds.client_id, "client id")?.to_string(),
            client_secret: required(&creds.client_secret, "client secret")?.to_string(),
            username: required(&creds.username, "username")?.to_string(),
            password: required(&creds.password, "password")?.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: OnceCell::new(),
        })
    }

    pub fn with_base_urls(mut self, auth_base: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.auth_base = auth_base.into().trim_end_matches('/').to_string();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn request_token(&self) -> Result<String, Box<dyn Error>> {
        let resp: TokenResponse = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (resp.access_token, resp.error) {
            (Some(token), _) => {
                info!("Obtained Reddit access token");
                Ok(token)
            }
            (None, Some(err)) => Err(format!("Reddit auth failed: {err}").into()),
            (None, None) => Err("Reddit auth returned no token".into()),
        }
    }

    async fn access_token(&self) -> Result<&str, Box<dyn Error>> {
        let token = self.token.get_or_try_init(|| self.request_token()).await?;
        Ok(token.as_str())
    }
}

impl DiscussionSource for RedditClient {
    #[instrument(level = "info", skip(self))]
    async fn newest(&self, community: &str, limit: usize) -> Result<Vec<DiscussionPost>, Box<dyn Error>> {
        let token = self.access_token().await?;
        let listing: Listing = self
            .http
            .get(format!("{}/r/{}/new", self.api_base, community))
            .bearer_auth(token)
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let posts: Vec<DiscussionPost> = listing
            .data
            .children
            .into_iter()
            .take(limit)
            .map(|t| t.data.into_post())
            .collect();
        debug!(count = posts.len(), "Fetched listing");
        Ok(posts)
    }
}

/// A Reddit client, or the reason one could not be built.
#[derive(Debug)]
pub enum RedditSource {
    Ready(RedditClient),
    Unavailable(String),
}

impl RedditSource {
    /// Build the client, logging (not propagating) construction failures.
    pub fn build(creds: &RedditCredentials) -> Self {
        match RedditClient::new(creds) {
            Ok(client) => RedditSource::Ready(client),
            Err(e) => {
                error!(error = %e, "Error initializing Reddit API");
                RedditSource::Unavailable(e.to_string())
            }
        }
    }
}

impl DiscussionSource for RedditSource {
    async fn newest(&self, community: &str, limit: usize) -> Result<Vec<DiscussionPost>, Box<dyn Error>> {
        match self {
            RedditSource::Ready(client) => client.newest(community, limit).await,
            RedditSource::Unavailable(reason) => Err(format!("Reddit client unavailable: {reason}").into()),
        }
    }
}

/// Fetch every community in order and return the rows plus per-community outcomes.
pub async fn gather<S: DiscussionSource>(
    source: &S,
    communities: &[String],
) -> (Vec<Row>, Vec<(String, SourceOutcome)>) {
    let mut rows = Vec::new();
    let mut outcomes = Vec::with_capacity(communities.len());

    for community in communities {
        info!(%community, "Scraping subreddit");
        match source.newest(community, POSTS_PER_COMMUNITY).await {
            Ok(posts) => {
                rows.extend(posts.iter().map(|p| p.to_row(community)));
                outcomes.push((community.clone(), SourceOutcome::from_count(posts.len())));
            }
            Err(e) => {
                error!(%community, error = %e, "Error scraping subreddit");
                outcomes.push((community.clone(), SourceOutcome::Failed(e.to_string())));
            }
        }
    }

    (rows, outcomes)
}

/// Run the Reddit collector end to end.
#[instrument(level = "info", skip_all, fields(communities = communities.len()))]
pub async fn collect<S: DiscussionSource, C: SinkConnector>(
    source: &S,
    communities: &[String],
    connector: &C,
) -> CollectorReport {
    let (rows, outcomes) = gather(source, communities).await;
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

    /// Canned listings keyed by community; unknown communities fail.
    #[derive(Debug, Default)]
    pub struct FakeReddit {
        pub listings: HashMap<String, Vec<DiscussionPost>>,
    }

    impl FakeReddit {
        pub fn with(mut self, community: &str, posts: Vec<DiscussionPost>) -> Self {
            self.listings.insert(community.to_string(), posts);
            self
        }
    }

    impl DiscussionSource for FakeReddit {
        async fn newest(&self, community: &str, limit: usize) -> Result<Vec<DiscussionPost>, Box<dyn Error>> {
            match self.listings.get(community) {
                Some(posts) => Ok(posts.iter().take(limit).cloned().collect()),
                None => Err(format!("403 Forbidden for r/{community}").into()),
            }
        }
    }

    pub fn post(title: &str) -> DiscussionPost {
        DiscussionPost {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            score: 10,
            num_comments: 2,
        }
    }
}
