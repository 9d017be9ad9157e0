use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::CapacitySnapshot;
use super::gateway::{GatewayError, OrganisationGateway};

pub const DEFAULT_MINIMUM_ORG_SEATS: i64 = 20;
pub const DEFAULT_MAX_ALLOWED_ORG_PENDING_INVITES: u64 = 10;

/// Seat-protection trip points. Both comparisons are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityThresholds {
    pub minimum_org_seats: i64,
    pub max_allowed_pending_invites: u64,
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            minimum_org_seats: DEFAULT_MINIMUM_ORG_SEATS,
            max_allowed_pending_invites: DEFAULT_MAX_ALLOWED_ORG_PENDING_INVITES,
        }
    }
}

impl CapacityThresholds {
    pub fn is_tripped_by(&self, snapshot: &CapacitySnapshot) -> bool {
        snapshot.available_seats <= self.minimum_org_seats
            || snapshot.pending_invites >= self.max_allowed_pending_invites
    }
}

/// Snapshots gathered for one decision plus the first one that tripped protection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityVerdict {
    pub thresholds: CapacityThresholds,
    pub snapshots: Vec<CapacitySnapshot>,
    pub tripped_by: Option<CapacitySnapshot>,
}

impl CapacityVerdict {
    pub fn protection_enabled(&self) -> bool {
        self.tripped_by.is_some()
    }

    /// Human-readable explanation when protection is on.
    pub fn reason(&self) -> Option<String> {
        self.tripped_by.as_ref().map(|snapshot| {
            format!(
                "GitHub seat protection enabled: {} has {} seats available (minimum {}) and {} pending invitations (maximum {})",
                snapshot.organisation,
                snapshot.available_seats,
                self.thresholds.minimum_org_seats,
                snapshot.pending_invites,
                self.thresholds.max_allowed_pending_invites,
            )
        })
    }
}

/// Fail-safe circuit breaker over the shared seat pool.
///
/// A single organisation at or past either threshold blocks automated
/// admission to every organisation. Nothing is cached: each call reads the
/// remote API afresh.
pub struct CapacityMonitor<'a, G: ?Sized> {
    gateway: &'a G,
    thresholds: CapacityThresholds,
}

impl<'a, G> CapacityMonitor<'a, G>
where
    G: OrganisationGateway + ?Sized,
{
    pub fn new(gateway: &'a G, thresholds: CapacityThresholds) -> Self {
        Self {
            gateway,
            thresholds,
        }
    }

    pub fn snapshot(&self, organisation: &str) -> Result<CapacitySnapshot, GatewayError> {
        let available_seats = self.gateway.available_seats(organisation)?;
        let pending_invites = self.gateway.pending_invites(organisation)?;
        debug!(
            organisation,
            available_seats, pending_invites, "fetched organisation capacity"
        );

        Ok(CapacitySnapshot {
            organisation: organisation.to_string(),
            available_seats,
            pending_invites,
        })
    }

    /// Stops at the first organisation that trips protection.
    pub fn evaluate<'o, I>(&self, organisations: I) -> Result<CapacityVerdict, GatewayError>
    where
        I: IntoIterator<Item = &'o str>,
    {
        let mut snapshots = Vec::new();

        for organisation in organisations {
            let snapshot = self.snapshot(organisation)?;
            if self.thresholds.is_tripped_by(&snapshot) {
                warn!(
                    organisation,
                    available_seats = snapshot.available_seats,
                    pending_invites = snapshot.pending_invites,
                    "seat protection tripped"
                );
                snapshots.push(snapshot.clone());
                return Ok(CapacityVerdict {
                    thresholds: self.thresholds,
                    snapshots,
                    tripped_by: Some(snapshot),
                });
            }
            snapshots.push(snapshot);
        }

        Ok(CapacityVerdict {
            thresholds: self.thresholds,
            snapshots,
            tripped_by: None,
        })
    }

    /// Reads every organisation, even after protection has tripped, for reporting.
    pub fn survey<'o, I>(&self, organisations: I) -> Result<CapacityVerdict, GatewayError>
    where
        I: IntoIterator<Item = &'o str>,
    {
        let snapshots = organisations
            .into_iter()
            .map(|organisation| self.snapshot(organisation))
            .collect::<Result<Vec<_>, _>>()?;
        let tripped_by = snapshots
            .iter()
            .find(|snapshot| self.thresholds.is_tripped_by(snapshot))
            .cloned();

        Ok(CapacityVerdict {
            thresholds: self.thresholds,
            snapshots,
            tripped_by,
        })
    }

    pub fn is_protection_enabled<'o, I>(&self, organisations: I) -> Result<bool, GatewayError>
    where
        I: IntoIterator<Item = &'o str>,
    {
        Ok(self.evaluate(organisations)?.protection_enabled())
    }
}
