//! Command-line interface definitions.
//!
//! Every credential can be given as a flag or through the environment (a
//! `.env` file in the working directory is loaded first). Secrets are hidden
//! from `--help` output.

use crate::collectors::reddit::RedditCredentials;
use crate::collectors::twitter::DEFAULT_SEARCH_BASE;
use crate::models::EmailMessage;
use crate::notify::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use clap::Parser;
use std::path::PathBuf;

/// Collect topic posts from Reddit, Twitter and news sites into a Google Sheet.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment / .env
/// majesticbot
///
/// # Explicit files
/// majesticbot --sources ./sources.json --token-file ./token.json --log-file ./run.log
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file listing subreddits, news sites and forums
    #[arg(short, long, default_value = "sources.json")]
    pub sources: PathBuf,

    /// Pre-authorized Google OAuth token file
    #[arg(long, default_value = "token.json")]
    pub token_file: PathBuf,

    /// Append-only run log
    #[arg(long, default_value = "majesticbot12.log")]
    pub log_file: PathBuf,

    /// Spreadsheet to append rows to
    #[arg(long, env = "GOOGLE_SHEET_ID", default_value = "YOUR_GOOGLE_SHEET_ID")]
    pub google_sheet_id: String,

    /// Google OAuth client secret file (accepted for compatibility; connections use --token-file)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET_FILE", default_value = "credentials.json")]
    pub google_client_secret_file: PathBuf,

    #[arg(long, env = "REDDIT_CLIENT_ID")]
    pub reddit_client_id: Option<String>,

    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub reddit_client_secret: Option<String>,

    #[arg(long, env = "REDDIT_USER_AGENT")]
    pub reddit_user_agent: Option<String>,

    #[arg(long, env = "REDDIT_USERNAME")]
    pub reddit_username: Option<String>,

    #[arg(long, env = "REDDIT_PASSWORD", hide_env_values = true)]
    pub reddit_password: Option<String>,

    /// Nitter-compatible frontend used for anonymous Twitter search
    #[arg(long, env = "TWITTER_SEARCH_BASE", default_value = DEFAULT_SEARCH_BASE)]
    pub twitter_search_base: String,

    /// Address the report is sent from (also the SMTP login)
    #[arg(long, env = "EMAIL_SENDER")]
    pub email_sender: Option<String>,

    #[arg(long, env = "EMAIL_APP_PASSWORD", hide_env_values = true)]
    pub email_app_password: Option<String>,

    #[arg(long, env = "EMAIL_RECIPIENT")]
    pub email_recipient: Option<String>,

    #[arg(long, env = "SMTP_HOST", default_value = DEFAULT_SMTP_HOST)]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,
}

impl Cli {
    pub fn reddit_credentials(&self) -> RedditCredentials {
        RedditCredentials {
            client_id: self.reddit_client_id.clone(),
            client_secret: self.reddit_client_secret.clone(),
            user_agent: self.reddit_user_agent.clone(),
            username: self.reddit_username.clone(),
            password: self.reddit_password.clone(),
        }
    }

    pub fn report_message(&self) -> EmailMessage {
        EmailMessage::weekly_report(self.email_sender.clone(), self.email_recipient.clone())
    }
}
