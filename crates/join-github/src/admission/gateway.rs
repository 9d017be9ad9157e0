use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit log action recorded when a member is removed from an organisation.
pub const MEMBER_REMOVED_ACTION: &str = "org.remove_member";

/// Remote organisation-management API consumed by the engine.
///
/// Implementations classify every failure into a [`GatewayError`] so callers
/// branch on the variant and never on message text.
pub trait OrganisationGateway: Send + Sync {
    fn available_seats(&self, organisation: &str) -> Result<i64, GatewayError>;
    fn pending_invites(&self, organisation: &str) -> Result<u64, GatewayError>;
    fn get_user(&self, username: &str) -> Result<UserRef, GatewayError>;
    fn invite_to_organisation(
        &self,
        organisation: &str,
        invitee: &Invitee,
    ) -> Result<(), GatewayError>;
    fn fetch_audit_page(&self, query: &AuditQuery<'_>) -> Result<AuditPage, GatewayError>;
}

/// Classified failure of a remote organisation-management call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("already a member of the organisation: {0}")]
    AlreadyMember(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("temporary remote failure: {0}")]
    Transient(String),
    #[error("remote call failed: {0}")]
    Unknown(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

/// Resolved GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: u64,
    pub login: String,
}

/// Who an invitation is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invitee {
    Email(String),
    User(UserRef),
}

impl Invitee {
    pub fn describe(&self) -> &str {
        match self {
            Invitee::Email(email) => email,
            Invitee::User(user) => &user.login,
        }
    }
}

/// One request for a page of the organisation audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery<'a> {
    pub organisation: &'a str,
    pub action: &'a str,
    pub since: DateTime<Utc>,
    /// Opaque continuation handed back by the previous page.
    pub page_token: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditEvent {
    pub user: Option<String>,
    pub action: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    pub next_page_token: Option<String>,
}

/// Manual-review channel for requests the engine will not decide alone.
pub trait ReviewNotifier: Send + Sync {
    fn notify_deferred(&self, requests: &[ReviewRequest]) -> Result<(), NotifyError>;
    fn notify_rejoin_request(
        &self,
        username: &str,
        email_address: &str,
        organisations: &[String],
    ) -> Result<(), NotifyError>;
}

/// One organisation a reviewer is asked to approve for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub candidate_identity: String,
    pub email_address: String,
    pub organisation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}
