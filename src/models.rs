//! Data models shared by the collectors, the sheet sink and the pipeline.
//!
//! - [`Cell`] / [`Row`]: schema-agnostic spreadsheet rows
//! - [`DiscussionPost`], [`MicroPost`], [`Headline`]: items fetched from each
//!   source type, each knowing how to flatten itself into a [`Row`]
//! - [`SourceOutcome`], [`Delivery`], [`CollectorReport`]: what happened to
//!   each configured source and to the collector's batch

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A single spreadsheet cell.
///
/// Serialized untagged so numbers reach the sheet as JSON numbers and are
/// interpreted as numbers rather than forced to text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Integer(n)
    }
}

/// An ordered sequence of cells. Shape varies by collector.
pub type Row = Vec<Cell>;

/// A post listed in a discussion community.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionPost {
    pub title: String,
    /// External link for link posts, permalink for self posts.
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
}

impl DiscussionPost {
    /// `(title, url, score, comment count, community)`
    pub fn to_row(&self, community: &str) -> Row {
        vec![
            self.title.clone().into(),
            self.url.clone().into(),
            self.score.into(),
            self.num_comments.into(),
            community.into(),
        ]
    }
}

/// A microblog post returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroPost {
    pub date: NaiveDate,
    pub content: String,
    pub username: String,
    pub url: String,
}

impl MicroPost {
    /// `(YYYY-MM-DD, text, author handle, post url)`
    pub fn to_row(&self) -> Row {
        vec![
            self.date.format("%Y-%m-%d").to_string().into(),
            self.content.clone().into(),
            self.username.clone().into(),
            self.url.clone().into(),
        ]
    }
}

/// A headline extracted from a news site's front page.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub heading: String,
    pub link: String,
    /// The configured site URL the headline was found on.
    pub site: String,
}

impl Headline {
    /// `(heading, link, site)`
    pub fn to_row(&self) -> Row {
        vec![
            self.heading.clone().into(),
            self.link.clone().into(),
            self.site.clone().into(),
        ]
    }
}

/// What happened when a collector visited one configured source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// The source produced this many rows (at least one).
    Collected(usize),
    /// The fetch worked but yielded nothing usable, or the run cap was already hit.
    Empty,
    /// The fetch failed; the message is what was logged.
    Failed(String),
}

impl SourceOutcome {
    pub fn from_count(n: usize) -> Self {
        if n == 0 {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Collected(n)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed(_))
    }
}

/// Fate of a collector's accumulated batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Appended(usize),
    NothingToAppend,
    /// The sink could not be opened; the batch was dropped.
    SinkUnavailable,
    /// The sink opened but the append call failed; the batch was dropped.
    AppendFailed(String),
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Appended(n) => write!(f, "appended {n} rows"),
            Delivery::NothingToAppend => write!(f, "nothing to append"),
            Delivery::SinkUnavailable => write!(f, "sink unavailable, batch dropped"),
            Delivery::AppendFailed(e) => write!(f, "append failed: {e}"),
        }
    }
}

/// Summary of one collector invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorReport {
    pub collector: &'static str,
    /// One entry per configured source, in visiting order.
    pub outcomes: Vec<(String, SourceOutcome)>,
    pub rows: usize,
    pub delivery: Delivery,
}

impl CollectorReport {
    pub fn failed_sources(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }
}

/// A fixed-content notification email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub const SUBJECT: &'static str = "🔍 MajesticBot12 Weekly Report";
    pub const BODY: &'static str = "MajesticBot12 has finished collecting data. The latest findings are available in Google Sheets.";

    /// The run-completed report addressed from `from` to `to`.
    pub fn weekly_report(from: Option<String>, to: Option<String>) -> Self {
        Self {
            from,
            to,
            subject: Self::SUBJECT.to_string(),
            body: Self::BODY.to_string(),
        }
    }
}
