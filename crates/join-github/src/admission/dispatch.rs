use tracing::{error, info, warn};

use super::domain::{InvitationFailure, InvitationResult};
use super::gateway::{GatewayError, Invitee, OrganisationGateway};

/// Outcome of dispatching to one organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub organisation: String,
    pub result: InvitationResult,
}

impl From<GatewayError> for InvitationFailure {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::AlreadyMember(_) => InvitationFailure::AlreadyMember,
            GatewayError::NotFound(_) => InvitationFailure::NotFound,
            GatewayError::Transient(detail) => InvitationFailure::TransientError(detail),
            GatewayError::Unknown(detail) => InvitationFailure::Unknown(detail),
        }
    }
}

/// Issues invitations one organisation at a time.
///
/// Every organisation gets its own attempt and its own recorded result; a
/// failure never stops the remaining organisations. Nothing is retried here.
pub struct InvitationDispatcher<'a, G: ?Sized> {
    gateway: &'a G,
    send_invites: bool,
}

impl<'a, G> InvitationDispatcher<'a, G>
where
    G: OrganisationGateway + ?Sized,
{
    pub fn new(gateway: &'a G, send_invites: bool) -> Self {
        Self {
            gateway,
            send_invites,
        }
    }

    pub fn invite(&self, organisation: &str, invitee: &Invitee) -> InvitationResult {
        if !self.send_invites {
            info!(
                organisation,
                invitee = invitee.describe(),
                "email invites disabled; invitation not sent"
            );
            return InvitationResult::Suppressed;
        }

        match self.gateway.invite_to_organisation(organisation, invitee) {
            Ok(()) => {
                info!(
                    organisation,
                    invitee = invitee.describe(),
                    "invited to organisation with the role 'member'"
                );
                InvitationResult::Invited
            }
            Err(err) => {
                log_failure(organisation, invitee.describe(), &err);
                InvitationResult::Failed(err.into())
            }
        }
    }

    /// New joiners are invited by their (lowercased) email address.
    pub fn dispatch_new_joiner<'o, I>(&self, organisations: I, email_address: &str) -> Vec<Dispatch>
    where
        I: IntoIterator<Item = &'o str>,
    {
        let invitee = Invitee::Email(email_address.trim().to_lowercase());
        organisations
            .into_iter()
            .map(|organisation| Dispatch {
                organisation: organisation.to_string(),
                result: self.invite(organisation, &invitee),
            })
            .collect()
    }

    /// Returning users are resolved to an account once, then invited by account.
    pub fn dispatch_returning<'o, I>(&self, organisations: I, username: &str) -> Vec<Dispatch>
    where
        I: IntoIterator<Item = &'o str>,
    {
        let organisations: Vec<&str> = organisations.into_iter().collect();
        if organisations.is_empty() {
            return Vec::new();
        }
        if !self.send_invites {
            info!(username, "email invites disabled; returning user not invited");
            return organisations
                .into_iter()
                .map(|organisation| Dispatch {
                    organisation: organisation.to_string(),
                    result: InvitationResult::Suppressed,
                })
                .collect();
        }

        let user = match self.gateway.get_user(&username.trim().to_lowercase()) {
            Ok(user) => user,
            Err(err) => {
                warn!(username, error = %err, "unable to resolve GitHub user");
                let failure = InvitationFailure::from(err);
                return organisations
                    .into_iter()
                    .map(|organisation| Dispatch {
                        organisation: organisation.to_string(),
                        result: InvitationResult::Failed(failure.clone()),
                    })
                    .collect();
            }
        };

        let invitee = Invitee::User(user);
        organisations
            .into_iter()
            .map(|organisation| Dispatch {
                organisation: organisation.to_string(),
                result: self.invite(organisation, &invitee),
            })
            .collect()
    }
}

fn log_failure(organisation: &str, invitee: &str, err: &GatewayError) {
    match err {
        GatewayError::AlreadyMember(_) => {
            info!(organisation, invitee, "already an organisation member")
        }
        GatewayError::NotFound(_) | GatewayError::Transient(_) => {
            warn!(organisation, invitee, error = %err, "invitation failed")
        }
        GatewayError::Unknown(_) => {
            error!(organisation, invitee, error = %err, "invitation failed unexpectedly")
        }
    }
}
