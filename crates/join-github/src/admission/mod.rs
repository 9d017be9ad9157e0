//! Organisation admission: policy, seat protection, rejoin verification and
//! invitation dispatch for the managed GitHub organisations.

pub mod audit;
pub mod capacity;
pub mod dispatch;
pub mod domain;
mod engine;
pub mod gateway;
pub mod github;
pub mod policy;
pub mod router;
pub mod slack;

#[cfg(test)]
mod tests;

pub use audit::AuditHistoryResolver;
pub use capacity::{CapacityMonitor, CapacityThresholds, CapacityVerdict};
pub use dispatch::{Dispatch, InvitationDispatcher};
pub use domain::{
    AdmissionDecision, AdmissionOutcome, AdmissionRequest, Candidate, CapacitySnapshot,
    InvitationFailure, InvitationResult, NotificationStatus, Organisation, OrganisationDecision,
    ValidationError,
};
pub use engine::{
    AdmissionConfig, AdmissionEngine, AdmissionError, RejoinPolicy, AWAITING_MANUAL_REVIEW,
    NOT_ELIGIBLE_TO_REJOIN,
};
pub use gateway::{
    AuditEvent, AuditPage, AuditQuery, GatewayError, Invitee, NotifyError, OrganisationGateway,
    ReviewNotifier, ReviewRequest, UserRef,
};
pub use github::GithubClient;
pub use policy::{DomainPolicyTable, PolicyError, MINISTRY_OF_JUSTICE, MOJ_ANALYTICAL_SERVICES};
pub use router::admission_router;
pub use slack::SlackNotifier;
