use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::audit::{AuditHistoryResolver, DEFAULT_AUDIT_LOOKBACK_DAYS};
use super::capacity::{CapacityMonitor, CapacityThresholds, CapacityVerdict};
use super::dispatch::{Dispatch, InvitationDispatcher};
use super::domain::{
    AdmissionDecision, AdmissionOutcome, AdmissionRequest, Candidate, NotificationStatus,
    Organisation, OrganisationDecision, ValidationError,
};
use super::gateway::{GatewayError, NotifyError, OrganisationGateway, ReviewNotifier, ReviewRequest};
use super::policy::DomainPolicyTable;

pub const NOT_ELIGIBLE_TO_REJOIN: &str = "not eligible to rejoin";
pub const AWAITING_MANUAL_REVIEW: &str = "email domain not pre-approved; awaiting manual review";

/// How an unverifiable rejoin claim affects the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejoinPolicy {
    /// One unverified organisation rejects the whole request.
    #[default]
    AbortBatch,
    /// Each organisation is judged on its own audit trail.
    PerOrganisation,
}

impl FromStr for RejoinPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort-batch" | "abort_batch" | "batch" => Ok(Self::AbortBatch),
            "per-organisation" | "per_organisation" | "per-organization" => {
                Ok(Self::PerOrganisation)
            }
            other => Err(format!(
                "unknown rejoin policy '{other}' (expected abort-batch or per-organisation)"
            )),
        }
    }
}

/// Tunables for the admission engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    pub thresholds: CapacityThresholds,
    pub audit_lookback: Duration,
    pub send_email_invites: bool,
    pub rejoin_policy: RejoinPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            thresholds: CapacityThresholds::default(),
            audit_lookback: Duration::days(DEFAULT_AUDIT_LOOKBACK_DAYS),
            send_email_invites: false,
            rejoin_policy: RejoinPolicy::default(),
        }
    }
}

/// Error raised by the admission engine before any invitation was attempted.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("organisation API unavailable, no invitations sent: {0}")]
    Remote(#[from] GatewayError),
}

/// Decision core composing the policy table, capacity monitor, audit
/// resolver, dispatcher and review notifier.
///
/// Each call to [`AdmissionEngine::admit`] runs strictly in sequence:
/// capacity, per-organisation decision, dispatch, notification.
pub struct AdmissionEngine<G, N> {
    policy: Arc<DomainPolicyTable>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    config: AdmissionConfig,
}

impl<G, N> AdmissionEngine<G, N>
where
    G: OrganisationGateway + 'static,
    N: ReviewNotifier + 'static,
{
    pub fn new(
        policy: Arc<DomainPolicyTable>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            policy,
            gateway,
            notifier,
            config,
        }
    }

    pub fn policy(&self) -> &DomainPolicyTable {
        &self.policy
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Full capacity report across every managed organisation.
    pub fn capacity_report(&self) -> Result<CapacityVerdict, GatewayError> {
        CapacityMonitor::new(self.gateway.as_ref(), self.config.thresholds)
            .survey(self.policy.managed_ids())
    }

    pub fn admit(&self, request: AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        let candidate = Candidate::new(&request.email_address, request.username.as_deref())?;
        if request.organisations.iter().all(|id| id.trim().is_empty()) {
            return Err(ValidationError::NoOrganisations.into());
        }

        let (managed, skipped) = self.partition(&request.organisations);
        for organisation in &skipped {
            info!(organisation = %organisation, "ignoring unmanaged organisation");
        }

        let mut decision = AdmissionDecision::empty(&candidate, skipped);
        if managed.is_empty() {
            return Ok(decision);
        }

        let verdict = CapacityMonitor::new(self.gateway.as_ref(), self.config.thresholds)
            .evaluate(self.policy.managed_ids())?;
        if let Some(reason) = verdict.reason() {
            decision.outcomes = managed
                .iter()
                .map(|organisation| {
                    OrganisationDecision::new(
                        organisation,
                        AdmissionOutcome::Blocked,
                        Some(reason.clone()),
                    )
                })
                .collect();
            return Ok(decision);
        }

        match candidate.username() {
            Some(username) => self.admit_returning(&candidate, username, &managed, &mut decision)?,
            None => self.admit_new_joiner(&candidate, &managed, &mut decision),
        }

        let retryable = decision.retryable_organisations();
        info!(
            candidate = candidate.identity(),
            returning = candidate.is_returning(),
            summary = %decision.summary(),
            "admission decided"
        );
        if !retryable.is_empty() {
            warn!(
                candidate = candidate.identity(),
                organisations = %retryable.join(", "),
                "invitations hit temporary GitHub failures; resubmit later"
            );
        }
        Ok(decision)
    }

    /// Splits requested identifiers into managed organisations (deduplicated,
    /// request order kept) and ignored identifiers.
    fn partition(&self, requested: &[String]) -> (Vec<&Organisation>, Vec<String>) {
        let mut managed: Vec<&Organisation> = Vec::new();
        let mut skipped = Vec::new();

        for id in requested.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            match self.policy.managed(id) {
                Some(organisation) => {
                    if !managed.iter().any(|existing| existing.id == organisation.id) {
                        managed.push(organisation);
                    }
                }
                None => skipped.push(id.to_string()),
            }
        }

        (managed, skipped)
    }

    fn admit_new_joiner(
        &self,
        candidate: &Candidate,
        managed: &[&Organisation],
        decision: &mut AdmissionDecision,
    ) {
        let email_address = candidate.email_address();
        let mut outcomes = Vec::with_capacity(managed.len());
        let mut reviews = Vec::new();

        for organisation in managed {
            if self.policy.is_pre_approved(&organisation.id, email_address) {
                outcomes.push(OrganisationDecision::new(
                    organisation,
                    AdmissionOutcome::Approved,
                    None,
                ));
            } else {
                outcomes.push(OrganisationDecision::new(
                    organisation,
                    AdmissionOutcome::Deferred,
                    Some(AWAITING_MANUAL_REVIEW.to_string()),
                ));
                reviews.push(ReviewRequest {
                    candidate_identity: candidate.identity().to_string(),
                    email_address: email_address.to_string(),
                    organisation: organisation.id.clone(),
                });
            }
        }

        let approved = approved_ids(&outcomes);
        let dispatches = InvitationDispatcher::new(self.gateway.as_ref(), self.config.send_email_invites)
            .dispatch_new_joiner(approved.iter().map(String::as_str), email_address);
        record_dispatches(&mut outcomes, dispatches);
        decision.outcomes = outcomes;

        if !reviews.is_empty() {
            decision.notification = self.notify(|notifier| notifier.notify_deferred(&reviews));
        }
    }

    fn admit_returning(
        &self,
        candidate: &Candidate,
        username: &str,
        managed: &[&Organisation],
        decision: &mut AdmissionDecision,
    ) -> Result<(), AdmissionError> {
        let resolver = AuditHistoryResolver::new(self.gateway.as_ref(), self.config.audit_lookback);
        let mut outcomes = Vec::with_capacity(managed.len());
        let mut unverified = Vec::new();

        for organisation in managed {
            if resolver.was_removed_recently(&organisation.id, username)? {
                outcomes.push(OrganisationDecision::new(
                    organisation,
                    AdmissionOutcome::Approved,
                    None,
                ));
                continue;
            }

            warn!(
                organisation = %organisation.id,
                username,
                "no recent removal on record; rejoin not verified"
            );
            unverified.push(organisation.id.clone());
            outcomes.push(OrganisationDecision::new(
                organisation,
                AdmissionOutcome::Rejected,
                Some(NOT_ELIGIBLE_TO_REJOIN.to_string()),
            ));

            if self.config.rejoin_policy == RejoinPolicy::AbortBatch {
                break;
            }
        }

        if !unverified.is_empty() && self.config.rejoin_policy == RejoinPolicy::AbortBatch {
            decision.outcomes = managed
                .iter()
                .map(|organisation| {
                    OrganisationDecision::new(
                        organisation,
                        AdmissionOutcome::Rejected,
                        Some(NOT_ELIGIBLE_TO_REJOIN.to_string()),
                    )
                })
                .collect();
            let organisations: Vec<String> = managed.iter().map(|org| org.id.clone()).collect();
            decision.notification = self.notify(|notifier| {
                notifier.notify_rejoin_request(username, candidate.email_address(), &organisations)
            });
            return Ok(());
        }

        let approved = approved_ids(&outcomes);
        let dispatches = InvitationDispatcher::new(self.gateway.as_ref(), self.config.send_email_invites)
            .dispatch_returning(approved.iter().map(String::as_str), username);
        record_dispatches(&mut outcomes, dispatches);
        decision.outcomes = outcomes;

        if !unverified.is_empty() {
            decision.notification = self.notify(|notifier| {
                notifier.notify_rejoin_request(username, candidate.email_address(), &unverified)
            });
        }
        Ok(())
    }

    /// Notification is best effort: a failure is logged and reported, never raised.
    fn notify<F>(&self, send: F) -> NotificationStatus
    where
        F: FnOnce(&N) -> Result<(), NotifyError>,
    {
        match send(self.notifier.as_ref()) {
            Ok(()) => NotificationStatus::Sent,
            Err(err) => {
                warn!(error = %err, "manual review notification failed");
                NotificationStatus::Failed(err.to_string())
            }
        }
    }
}

fn approved_ids(outcomes: &[OrganisationDecision]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|decision| decision.outcome == AdmissionOutcome::Approved)
        .map(|decision| decision.organisation.clone())
        .collect()
}

fn record_dispatches(outcomes: &mut [OrganisationDecision], dispatches: Vec<Dispatch>) {
    for dispatch in dispatches {
        if let Some(decision) = outcomes
            .iter_mut()
            .find(|decision| decision.organisation == dispatch.organisation)
        {
            decision.invitation = Some(dispatch.result);
        }
    }
}
