use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Organisation known to the admission engine, loaded once at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: String,
    pub label: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub allowed_domains: BTreeSet<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Inbound admission request as submitted by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub email_address: String,
    #[serde(default)]
    pub username: Option<String>,
    pub organisations: Vec<String>,
}

/// Validated identity of the person asking to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    email_address: String,
    username: Option<String>,
}

impl Candidate {
    /// A blank username is the same as no username: the candidate is a new joiner.
    pub fn new(email_address: &str, username: Option<&str>) -> Result<Self, ValidationError> {
        let email_address = email_address.trim();
        if email_address.is_empty() {
            return Err(ValidationError::MissingEmailAddress);
        }
        if email_address.matches('@').count() != 1 {
            return Err(ValidationError::MalformedEmailAddress(
                email_address.to_string(),
            ));
        }

        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Self {
            email_address: email_address.to_string(),
            username,
        })
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_returning(&self) -> bool {
        self.username.is_some()
    }

    /// Name shown to reviewers: the GitHub username when given, otherwise the email address.
    pub fn identity(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email_address)
    }
}

/// Input problems detected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("an email address is required")]
    MissingEmailAddress,
    #[error("email address '{0}' must contain exactly one '@'")]
    MalformedEmailAddress(String),
    #[error("at least one organisation must be requested")]
    NoOrganisations,
}

/// Remaining capacity of one organisation at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub organisation: String,
    pub available_seats: i64,
    pub pending_invites: u64,
}

/// Terminal admission outcome for one organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionOutcome {
    Approved,
    Deferred,
    Rejected,
    Blocked,
}

impl AdmissionOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            AdmissionOutcome::Approved => "approved",
            AdmissionOutcome::Deferred => "deferred",
            AdmissionOutcome::Rejected => "rejected",
            AdmissionOutcome::Blocked => "blocked",
        }
    }
}

/// Result of attempting an invitation against one organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationResult {
    Invited,
    /// Invitations are switched off; nothing was sent.
    Suppressed,
    Failed(InvitationFailure),
}

impl InvitationResult {
    pub fn is_invited(&self) -> bool {
        matches!(self, InvitationResult::Invited)
    }

    pub fn summary(&self) -> String {
        match self {
            InvitationResult::Invited => "invitation sent".to_string(),
            InvitationResult::Suppressed => "invitation suppressed (email invites disabled)".to_string(),
            InvitationResult::Failed(failure) => failure.summary(),
        }
    }
}

/// Classified invitation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationFailure {
    AlreadyMember,
    NotFound,
    TransientError(String),
    Unknown(String),
}

impl InvitationFailure {
    /// Transient failures are left to the caller to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvitationFailure::TransientError(_))
    }

    pub fn summary(&self) -> String {
        match self {
            InvitationFailure::AlreadyMember => "user already a GitHub organisation member".to_string(),
            InvitationFailure::NotFound => "user not found on GitHub".to_string(),
            InvitationFailure::TransientError(detail) => {
                format!("temporary GitHub failure, retry later: {detail}")
            }
            InvitationFailure::Unknown(detail) => {
                format!("unknown error adding user to GitHub organisation: {detail}")
            }
        }
    }
}

/// Per-organisation line of an admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationDecision {
    pub organisation: String,
    pub label: String,
    pub outcome: AdmissionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation: Option<InvitationResult>,
}

impl OrganisationDecision {
    pub(crate) fn new(
        organisation: &Organisation,
        outcome: AdmissionOutcome,
        reason: Option<String>,
    ) -> Self {
        Self {
            organisation: organisation.id.clone(),
            label: organisation.label.clone(),
            outcome,
            reason,
            invitation: None,
        }
    }
}

/// Whether the manual-review channel was used for this decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    NotRequired,
    Sent,
    Failed(String),
}

/// Complete answer to one admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub outcomes: Vec<OrganisationDecision>,
    /// Requested identifiers that are not managed and were ignored.
    pub skipped: Vec<String>,
    pub notification: NotificationStatus,
}

impl AdmissionDecision {
    pub(crate) fn empty(candidate: &Candidate, skipped: Vec<String>) -> Self {
        Self {
            email_address: candidate.email_address().to_string(),
            username: candidate.username().map(str::to_string),
            outcomes: Vec::new(),
            skipped,
            notification: NotificationStatus::NotRequired,
        }
    }

    pub fn outcome_for(&self, organisation: &str) -> Option<&OrganisationDecision> {
        self.outcomes
            .iter()
            .find(|decision| decision.organisation.eq_ignore_ascii_case(organisation))
    }

    pub fn is_blocked(&self) -> bool {
        self.outcomes
            .iter()
            .any(|decision| decision.outcome == AdmissionOutcome::Blocked)
    }

    /// Organisations whose invitation failed transiently and may be resubmitted.
    pub fn retryable_organisations(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|decision| {
                matches!(
                    &decision.invitation,
                    Some(InvitationResult::Failed(failure)) if failure.is_retryable()
                )
            })
            .map(|decision| decision.organisation.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.outcomes.is_empty() {
            return "no managed organisations requested".to_string();
        }

        self.outcomes
            .iter()
            .map(|decision| {
                let detail = match (&decision.invitation, &decision.reason) {
                    (Some(invitation), _) => invitation.summary(),
                    (None, Some(reason)) => reason.clone(),
                    (None, None) => String::new(),
                };
                if detail.is_empty() {
                    format!("{}: {}", decision.label, decision.outcome.label())
                } else {
                    format!("{}: {} ({})", decision.label, decision.outcome.label(), detail)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
