use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::gateway::{NotifyError, ReviewNotifier, ReviewRequest};

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
pub const OPERATIONS_ENGINEERING_ALERTS_CHANNEL_ID: &str = "C033QBE511V";

const MESSAGE_HEADING: &str = "*Join GitHub Automation*";

/// Posts manual-review requests to the operations engineering Slack channel.
pub struct SlackNotifier {
    http: Client,
    base_url: String,
    token: String,
    channel: String,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| NotifyError::Transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            channel: channel.into(),
        })
    }

    fn post_message(&self, text: &str) -> Result<(), NotifyError> {
        let payload = json!({
            "channel": self.channel,
            "mrkdwn": true,
            "text": text,
            "blocks": [{
                "type": "section",
                "text": { "type": "mrkdwn", "text": text },
            }],
        });

        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Transport(format!("Slack returned {status}")));
        }

        let body: SlackResponse = response
            .json()
            .map_err(|err| NotifyError::Transport(format!("unreadable Slack response: {err}")))?;
        if body.ok {
            info!(channel = %self.channel, "manual review request posted");
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown Slack error".to_string()),
            ))
        }
    }
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("base_url", &self.base_url)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl ReviewNotifier for SlackNotifier {
    fn notify_deferred(&self, requests: &[ReviewRequest]) -> Result<(), NotifyError> {
        match deferred_message(requests) {
            Some(text) => self.post_message(&text),
            None => Ok(()),
        }
    }

    fn notify_rejoin_request(
        &self,
        username: &str,
        email_address: &str,
        organisations: &[String],
    ) -> Result<(), NotifyError> {
        self.post_message(&rejoin_message(username, email_address, organisations))
    }
}

/// One message covering every deferred organisation of a request.
pub fn deferred_message(requests: &[ReviewRequest]) -> Option<String> {
    let first = requests.first()?;
    let organisations: Vec<&str> = requests
        .iter()
        .map(|request| request.organisation.as_str())
        .collect();

    Some(format!(
        "{MESSAGE_HEADING}\nPlease review add user {} to GitHub Organisation/s: {}. Email address is {}.",
        first.candidate_identity,
        organisations.join(" and "),
        first.email_address
    ))
}

pub fn rejoin_message(username: &str, email_address: &str, organisations: &[String]) -> String {
    format!(
        "{MESSAGE_HEADING}\nThe user {username} wants to rejoin the GitHub Organisation/s: {}. Email address is {email_address}.",
        organisations.join(" and ")
    )
}
