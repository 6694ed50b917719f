//! Source collectors.
//!
//! Each collector walks its configured sources in order, turns what it finds
//! into rows, and appends the whole batch to a freshly opened sink:
//!
//! | Collector | Module | Sources | Row |
//! |-----------|--------|---------|-----|
//! | Reddit | [`reddit`] | `subreddits` from `sources.json` | title, url, score, comments, subreddit |
//! | Twitter | [`twitter`] | fixed topic keywords | date, text, username, url |
//! | News sites | [`news`] | `news_sites` from `sources.json` | heading, link, site |
//!
//! A failing source is logged and skipped; the collector carries on with the
//! next one. No collector returns an error to its caller. What happened is
//! reported in a [`CollectorReport`](crate::models::CollectorReport) instead.

pub mod news;
pub mod reddit;
pub mod twitter;
