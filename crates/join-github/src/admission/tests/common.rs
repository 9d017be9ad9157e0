use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::admission::gateway::{
    AuditEvent, AuditPage, AuditQuery, GatewayError, Invitee, NotifyError, OrganisationGateway,
    ReviewNotifier, ReviewRequest, UserRef, MEMBER_REMOVED_ACTION,
};
use crate::admission::{
    AdmissionConfig, AdmissionEngine, AdmissionRequest, DomainPolicyTable, MINISTRY_OF_JUSTICE,
    MOJ_ANALYTICAL_SERVICES,
};

pub(super) const HEALTHY_SEATS: i64 = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum GatewayCall {
    AvailableSeats(String),
    PendingInvites(String),
    GetUser(String),
    Invite {
        organisation: String,
        invitee: Invitee,
    },
    AuditPage {
        organisation: String,
        page_token: Option<String>,
    },
}

/// Scriptable organisation API. Unconfigured organisations have plenty of
/// seats, no pending invitations and an empty audit log.
#[derive(Default)]
pub(super) struct FakeGateway {
    seats: HashMap<String, i64>,
    pending: HashMap<String, u64>,
    capacity_error: Option<GatewayError>,
    audit_pages: HashMap<(String, Option<String>), AuditPage>,
    invite_errors: HashMap<String, GatewayError>,
    user_error: Option<GatewayError>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    pub(super) fn with_seats(mut self, organisation: &str, seats: i64) -> Self {
        self.seats.insert(organisation.to_string(), seats);
        self
    }

    pub(super) fn with_pending(mut self, organisation: &str, pending: u64) -> Self {
        self.pending.insert(organisation.to_string(), pending);
        self
    }

    pub(super) fn with_capacity_error(mut self, error: GatewayError) -> Self {
        self.capacity_error = Some(error);
        self
    }

    /// Single audit page listing `users` as removed a week ago.
    pub(super) fn with_removed(self, organisation: &str, users: &[&str]) -> Self {
        let page = AuditPage {
            events: users.iter().map(|user| removal(user)).collect(),
            next_page_token: None,
        };
        self.with_audit_page(organisation, None, page)
    }

    pub(super) fn with_audit_page(
        mut self,
        organisation: &str,
        page_token: Option<&str>,
        page: AuditPage,
    ) -> Self {
        self.audit_pages.insert(
            (organisation.to_string(), page_token.map(str::to_string)),
            page,
        );
        self
    }

    pub(super) fn with_invite_error(mut self, organisation: &str, error: GatewayError) -> Self {
        self.invite_errors.insert(organisation.to_string(), error);
        self
    }

    pub(super) fn with_user_error(mut self, error: GatewayError) -> Self {
        self.user_error = Some(error);
        self
    }

    pub(super) fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub(super) fn invites(&self) -> Vec<(String, Invitee)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Invite {
                    organisation,
                    invitee,
                } => Some((organisation, invitee)),
                _ => None,
            })
            .collect()
    }

    pub(super) fn audit_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::AuditPage { .. }))
            .count()
    }

    pub(super) fn user_lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::GetUser(_)))
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().expect("call log poisoned").push(call);
    }
}

impl OrganisationGateway for FakeGateway {
    fn available_seats(&self, organisation: &str) -> Result<i64, GatewayError> {
        self.record(GatewayCall::AvailableSeats(organisation.to_string()));
        if let Some(error) = &self.capacity_error {
            return Err(error.clone());
        }
        Ok(self.seats.get(organisation).copied().unwrap_or(HEALTHY_SEATS))
    }

    fn pending_invites(&self, organisation: &str) -> Result<u64, GatewayError> {
        self.record(GatewayCall::PendingInvites(organisation.to_string()));
        Ok(self.pending.get(organisation).copied().unwrap_or(0))
    }

    fn get_user(&self, username: &str) -> Result<UserRef, GatewayError> {
        self.record(GatewayCall::GetUser(username.to_string()));
        match &self.user_error {
            Some(error) => Err(error.clone()),
            None => Ok(UserRef {
                id: 583231,
                login: username.to_string(),
            }),
        }
    }

    fn invite_to_organisation(
        &self,
        organisation: &str,
        invitee: &Invitee,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Invite {
            organisation: organisation.to_string(),
            invitee: invitee.clone(),
        });
        match self.invite_errors.get(organisation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn fetch_audit_page(&self, query: &AuditQuery<'_>) -> Result<AuditPage, GatewayError> {
        self.record(GatewayCall::AuditPage {
            organisation: query.organisation.to_string(),
            page_token: query.page_token.map(str::to_string),
        });
        let key = (
            query.organisation.to_string(),
            query.page_token.map(str::to_string),
        );
        Ok(self.audit_pages.get(&key).cloned().unwrap_or_default())
    }
}

pub(super) fn removal(user: &str) -> AuditEvent {
    AuditEvent {
        user: Some(user.to_string()),
        action: Some(MEMBER_REMOVED_ACTION.to_string()),
        created_at: Some(Utc::now() - chrono::Duration::days(7)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Notification {
    Deferred(Vec<ReviewRequest>),
    Rejoin {
        username: String,
        email_address: String,
        organisations: Vec<String>,
    },
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ReviewNotifier for MemoryNotifier {
    fn notify_deferred(&self, requests: &[ReviewRequest]) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(Notification::Deferred(requests.to_vec()));
        Ok(())
    }

    fn notify_rejoin_request(
        &self,
        username: &str,
        email_address: &str,
        organisations: &[String],
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(Notification::Rejoin {
                username: username.to_string(),
                email_address: email_address.to_string(),
                organisations: organisations.to_vec(),
            });
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl ReviewNotifier for FailingNotifier {
    fn notify_deferred(&self, _requests: &[ReviewRequest]) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("slack unreachable".to_string()))
    }

    fn notify_rejoin_request(
        &self,
        _username: &str,
        _email_address: &str,
        _organisations: &[String],
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("slack unreachable".to_string()))
    }
}

pub(super) fn invites_enabled() -> AdmissionConfig {
    AdmissionConfig {
        send_email_invites: true,
        ..AdmissionConfig::default()
    }
}

pub(super) fn build_engine(
    gateway: FakeGateway,
    config: AdmissionConfig,
) -> (
    AdmissionEngine<FakeGateway, MemoryNotifier>,
    Arc<FakeGateway>,
    Arc<MemoryNotifier>,
) {
    let gateway = Arc::new(gateway);
    let notifier = Arc::new(MemoryNotifier::default());
    let engine = AdmissionEngine::new(
        Arc::new(DomainPolicyTable::ministry_of_justice()),
        gateway.clone(),
        notifier.clone(),
        config,
    );
    (engine, gateway, notifier)
}

pub(super) fn request(email_address: &str, username: Option<&str>) -> AdmissionRequest {
    AdmissionRequest {
        email_address: email_address.to_string(),
        username: username.map(str::to_string),
        organisations: vec![
            MINISTRY_OF_JUSTICE.to_string(),
            MOJ_ANALYTICAL_SERVICES.to_string(),
        ],
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
