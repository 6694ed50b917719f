//! One collection run.
//!
//! Collectors run strictly one after another (Reddit, Twitter, news sites),
//! each opening its own sink, and the email notice is attempted last no
//! matter how they fared. Nothing here returns an error.

use crate::collectors::news::{self, PageFetcher};
use crate::collectors::reddit::{self, DiscussionSource};
use crate::collectors::twitter::{self, MicroblogSearch};
use crate::config::SourceConfig;
use crate::models::{CollectorReport, EmailMessage};
use crate::notify::{Mailer, notify};
use crate::sink::SinkConnector;
use tracing::{info, instrument, warn};

/// The external clients a run talks to.
#[derive(Debug)]
pub struct Clients<R, T, F, C, M> {
    pub reddit: R,
    pub twitter: T,
    pub news: F,
    pub sheets: C,
    pub mailer: M,
}

/// What a run did, for the final log lines.
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<CollectorReport>,
    pub email_sent: bool,
}

impl<R, T, F, C, M> Clients<R, T, F, C, M>
where
    R: DiscussionSource,
    T: MicroblogSearch,
    F: PageFetcher,
    C: SinkConnector,
    M: Mailer,
{
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self, sources: &SourceConfig, keywords: &[&str], message: &EmailMessage) -> RunSummary {
        if !sources.forums.is_empty() {
            warn!(count = sources.forums.len(), "Forums are configured but no collector reads them");
        }

        let mut reports = Vec::with_capacity(3);
        reports.push(reddit::collect(&self.reddit, &sources.subreddits, &self.sheets).await);
        reports.push(twitter::collect(&self.twitter, keywords, &self.sheets).await);
        reports.push(news::collect(&self.news, &sources.news_sites, &self.sheets).await);

        for report in &reports {
            info!(
                collector = report.collector,
                sources = report.outcomes.len(),
                failed = report.failed_sources(),
                rows = report.rows,
                delivery = %report.delivery,
                "Collector finished"
            );
        }

        let email_sent = notify(&self.mailer, message).await;
        RunSummary { reports, email_sent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::news::testing::FakeFetcher;
    use crate::collectors::reddit::testing::{FakeReddit, post};
    use crate::collectors::news::NewsSource;
    use crate::collectors::twitter::TwitterSource;
    use crate::collectors::twitter::testing::FakeSearch;
    use crate::models::{Delivery, SourceOutcome};
    use crate::notify::testing::RecordingMailer;
    use crate::sink::testing::RecordingConnector;

    const ARTICLE: &str = r#"<html><body><article><h2>Disclosure hearing</h2><a href="https://news.example/1">more</a></article></body></html>"#;

    fn message() -> EmailMessage {
        EmailMessage::weekly_report(Some("bot@example.com".into()), Some("me@example.com".into()))
    }

    #[tokio::test]
    async fn test_end_to_end_one_source_each() {
        let clients = Clients {
            reddit: FakeReddit::default().with("UFOs", vec![post("orb")]),
            twitter: FakeSearch::default().with("UFO", 1),
            news: FakeFetcher::default().with("https://news.example", ARTICLE),
            sheets: RecordingConnector::default(),
            mailer: RecordingMailer::default(),
        };
        let sources = SourceConfig {
            subreddits: vec!["UFOs".into()],
            news_sites: vec!["https://news.example".into()],
            forums: vec![],
        };

        let summary = clients.run(&sources, &["UFO"], &message()).await;

        let batches = clients.sheets.batches.borrow();
        assert_eq!(batches.len(), 3);
        // Reddit, then Twitter, then news.
        assert_eq!(batches[0][0].len(), 5);
        assert_eq!(batches[1][0].len(), 4);
        assert_eq!(batches[2][0].len(), 3);
        assert_eq!(clients.sheets.rows().len(), 3);

        assert_eq!(clients.mailer.attempts.borrow().len(), 1);
        assert!(summary.email_sent);
    }

    #[tokio::test]
    async fn test_empty_sources_produce_no_rows() {
        let clients = Clients {
            reddit: FakeReddit::default(),
            twitter: FakeSearch::default(),
            news: FakeFetcher::default(),
            sheets: RecordingConnector::default(),
            mailer: RecordingMailer::default(),
        };

        let summary = clients.run(&SourceConfig::default(), &[], &message()).await;

        assert!(clients.sheets.rows().is_empty());
        assert!(summary.reports.iter().all(|r| r.rows == 0));
        assert!(summary.reports.iter().all(|r| r.delivery == Delivery::NothingToAppend));
        assert_eq!(clients.mailer.attempts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_the_run() {
        let clients = Clients {
            reddit: FakeReddit::default().with("UFOs", vec![post("orb")]),
            twitter: FakeSearch::default().with("UFO", 3),
            news: FakeFetcher::default().with("https://news.example", ARTICLE),
            sheets: RecordingConnector::failing(),
            mailer: RecordingMailer::default(),
        };
        let sources = SourceConfig {
            subreddits: vec!["UFOs".into()],
            news_sites: vec!["https://news.example".into()],
            forums: vec!["https://forum.example".into()],
        };

        let summary = clients.run(&sources, &["UFO"], &message()).await;

        assert_eq!(*clients.sheets.connects.borrow(), 3);
        assert!(summary.reports.iter().all(|r| r.delivery == Delivery::SinkUnavailable));
        assert_eq!(summary.reports[1].outcomes[0].1, SourceOutcome::Collected(3));
        assert_eq!(clients.mailer.attempts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_email_failure_is_reported_not_raised() {
        let clients = Clients {
            reddit: FakeReddit::default(),
            twitter: FakeSearch::default(),
            news: FakeFetcher::default(),
            sheets: RecordingConnector::default(),
            mailer: RecordingMailer {
                fail: true,
                ..Default::default()
            },
        };

        let summary = clients.run(&SourceConfig::default(), &[], &message()).await;
        assert!(!summary.email_sent);
    }

    #[tokio::test]
    async fn test_unbuildable_clients_still_reach_the_email() {
        let clients = Clients {
            reddit: FakeReddit::default().with("UFOs", vec![post("orb")]),
            twitter: TwitterSource::build("nitter.net"),
            news: NewsSource::Unavailable("no TLS backend".to_string()),
            sheets: RecordingConnector::default(),
            mailer: RecordingMailer::default(),
        };
        let sources = SourceConfig {
            subreddits: vec!["UFOs".into()],
            news_sites: vec!["https://news.example".into()],
            forums: vec![],
        };

        let summary = clients.run(&sources, &["UFO"], &message()).await;

        assert_eq!(summary.reports.len(), 3);
        assert_eq!(summary.reports[0].delivery, Delivery::Appended(1));
        assert!(summary.reports[1].outcomes[0].1.is_failed());
        assert!(summary.reports[2].outcomes[0].1.is_failed());
        assert_eq!(clients.mailer.attempts.borrow().len(), 1);
        assert!(summary.email_sent);
    }
}
