use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::gateway::{AuditQuery, GatewayError, OrganisationGateway, MEMBER_REMOVED_ACTION};

pub const DEFAULT_AUDIT_LOOKBACK_DAYS: i64 = 90;

/// Answers "was this user removed from the organisation recently?" from the
/// remote audit log.
pub struct AuditHistoryResolver<'a, G: ?Sized> {
    gateway: &'a G,
    lookback: Duration,
}

impl<'a, G> AuditHistoryResolver<'a, G>
where
    G: OrganisationGateway + ?Sized,
{
    pub fn new(gateway: &'a G, lookback: Duration) -> Self {
        Self { gateway, lookback }
    }

    /// Lowercased usernames removed within the lookback window ending now.
    pub fn fetch_removal_set(&self, organisation: &str) -> Result<BTreeSet<String>, GatewayError> {
        self.fetch_removal_set_since(organisation, Utc::now() - self.lookback)
    }

    /// Follows continuation tokens until the log reports no further page.
    pub fn fetch_removal_set_since(
        &self,
        organisation: &str,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, GatewayError> {
        let mut removed = BTreeSet::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let query = AuditQuery {
                organisation,
                action: MEMBER_REMOVED_ACTION,
                since,
                page_token: page_token.as_deref(),
            };
            let page = self.gateway.fetch_audit_page(&query)?;
            pages += 1;

            for event in page.events {
                if event
                    .action
                    .as_deref()
                    .is_some_and(|action| action != MEMBER_REMOVED_ACTION)
                {
                    continue;
                }
                if event.created_at.is_some_and(|created_at| created_at < since) {
                    continue;
                }
                if let Some(user) = event.user {
                    let user = user.trim().to_lowercase();
                    if !user.is_empty() {
                        removed.insert(user);
                    }
                }
            }

            match page.next_page_token {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(GatewayError::Unknown(format!(
                            "audit log for {organisation} returned page token {token} twice"
                        )));
                    }
                    page_token = Some(token);
                }
                None => break,
            }
        }

        debug!(
            organisation,
            pages,
            removed = removed.len(),
            "resolved recently removed members"
        );
        Ok(removed)
    }

    pub fn was_removed_recently(
        &self,
        organisation: &str,
        username: &str,
    ) -> Result<bool, GatewayError> {
        let removed = self.fetch_removal_set(organisation)?;
        Ok(removed.contains(&username.trim().to_lowercase()))
    }
}
