use std::time::Duration;

use chrono::{TimeZone, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::{Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;

use super::gateway::{
    AuditEvent, AuditPage, AuditQuery, GatewayError, Invitee, OrganisationGateway, UserRef,
};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const PAGE_SIZE: &str = "100";
const ALREADY_MEMBER_MESSAGE: &str = "already a part of this organization";
const INVITATION_RATE_LIMIT_MESSAGE: &str = "invitation rate limit";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking GitHub REST client scoped to organisation administration.
pub struct GithubClient {
    http: Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .user_agent(concat!("join-github/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Unknown(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .map_err(|err| GatewayError::Transient(format!("request to GitHub failed: {err}")))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify(response))
        }
    }

    /// Returns the decoded body and the `rel="next"` link, if any.
    fn get_page<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<(T, Option<String>), GatewayError> {
        let response = self.send(builder)?;
        let next = next_link(response.headers());
        let body = response
            .json::<T>()
            .map_err(|err| GatewayError::Unknown(format!("unexpected GitHub response: {err}")))?;
        Ok((body, next))
    }
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct OrganisationBody {
    plan: Option<PlanBody>,
}

#[derive(Deserialize)]
struct PlanBody {
    seats: i64,
    filled_seats: i64,
}

#[derive(Deserialize)]
struct UserBody {
    id: u64,
    login: String,
}

#[derive(Deserialize)]
struct AuditEntryBody {
    user: Option<String>,
    action: Option<String>,
    /// Milliseconds since the epoch.
    created_at: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    /// Entries are objects with a `message` field or bare strings.
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl ErrorBody {
    /// Top-level message followed by every detail message.
    fn full_message(self) -> String {
        let details: Vec<&str> = self
            .errors
            .iter()
            .filter_map(|detail| detail.as_str().or_else(|| detail["message"].as_str()))
            .collect();
        if details.is_empty() {
            self.message
        } else {
            format!("{}: {}", self.message, details.join("; "))
        }
    }
}

impl OrganisationGateway for GithubClient {
    fn available_seats(&self, organisation: &str) -> Result<i64, GatewayError> {
        let url = self.url(&format!("/orgs/{}", organisation.to_lowercase()));
        let (body, _) = self.get_page::<OrganisationBody>(self.request(Method::GET, &url))?;
        let plan = body.plan.ok_or_else(|| {
            GatewayError::Unknown(format!(
                "plan details for {organisation} are not visible to this token"
            ))
        })?;
        Ok(plan.seats - plan.filled_seats)
    }

    fn pending_invites(&self, organisation: &str) -> Result<u64, GatewayError> {
        let first = self.url(&format!("/orgs/{}/invitations", organisation.to_lowercase()));
        let mut builder = self
            .request(Method::GET, &first)
            .query(&[("per_page", PAGE_SIZE)]);
        let mut total = 0u64;

        loop {
            let (invitations, next) = self.get_page::<Vec<IgnoredAny>>(builder)?;
            total += invitations.len() as u64;
            match next {
                Some(url) => builder = self.request(Method::GET, &url),
                None => return Ok(total),
            }
        }
    }

    fn get_user(&self, username: &str) -> Result<UserRef, GatewayError> {
        let url = self.url(&format!("/users/{}", username.to_lowercase()));
        let (body, _) = self.get_page::<UserBody>(self.request(Method::GET, &url))?;
        Ok(UserRef {
            id: body.id,
            login: body.login,
        })
    }

    fn invite_to_organisation(
        &self,
        organisation: &str,
        invitee: &Invitee,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("/orgs/{}/invitations", organisation.to_lowercase()));
        let payload = match invitee {
            Invitee::Email(email) => json!({ "email": email, "role": "direct_member" }),
            Invitee::User(user) => json!({ "invitee_id": user.id, "role": "direct_member" }),
        };
        self.send(self.request(Method::POST, &url).json(&payload))?;
        Ok(())
    }

    fn fetch_audit_page(&self, query: &AuditQuery<'_>) -> Result<AuditPage, GatewayError> {
        let builder = match query.page_token {
            Some(next_url) => self.request(Method::GET, next_url),
            None => {
                let url = self.url(&format!(
                    "/orgs/{}/audit-log",
                    query.organisation.to_lowercase()
                ));
                let phrase = format!(
                    "action:{} created:>={}",
                    query.action,
                    query.since.format("%Y-%m-%dT%H:%M:%SZ")
                );
                self.request(Method::GET, &url)
                    .query(&[("phrase", phrase.as_str()), ("per_page", PAGE_SIZE)])
            }
        };

        let (entries, next_page_token) = self.get_page::<Vec<AuditEntryBody>>(builder)?;
        let events = entries
            .into_iter()
            .map(|entry| AuditEvent {
                user: entry.user,
                action: entry.action,
                created_at: entry
                    .created_at
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            })
            .collect();

        Ok(AuditPage {
            events,
            next_page_token,
        })
    }
}

fn classify(response: Response) -> GatewayError {
    let status = response.status();
    let rate_limited = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        == Some("0");
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(ErrorBody::full_message)
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::UNPROCESSABLE_ENTITY => classify_unprocessable(message),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::Transient(message),
        StatusCode::FORBIDDEN if rate_limited => GatewayError::Transient(message),
        status if status.is_server_error() => GatewayError::Transient(format!("{status}: {message}")),
        status => GatewayError::Unknown(format!("{status}: {message}")),
    }
}

/// GitHub answers 422 for existing members, invitation rate limits and plain
/// validation failures alike; only the message tells them apart.
fn classify_unprocessable(message: String) -> GatewayError {
    let lowered = message.to_lowercase();
    if lowered.contains(ALREADY_MEMBER_MESSAGE) {
        GatewayError::AlreadyMember(message)
    } else if lowered.contains(INVITATION_RATE_LIMIT_MESSAGE) {
        GatewayError::Transient(message)
    } else {
        GatewayError::Unknown(format!("{}: {message}", StatusCode::UNPROCESSABLE_ENTITY))
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub(crate) fn next_link(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(LINK)?.to_str().ok()?;
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|target| target.strip_suffix('>'))
            .map(str::to_string)
    })
}
