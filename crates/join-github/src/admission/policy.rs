use std::collections::BTreeSet;
use std::io::Read;

use super::domain::Organisation;

pub const MINISTRY_OF_JUSTICE: &str = "ministryofjustice";
pub const MOJ_ANALYTICAL_SERVICES: &str = "moj-analytical-services";

const MOJ_ORG_ALLOWED_EMAIL_DOMAINS: &[&str] = &[
    "digital.justice.gov.uk",
    "justice.gov.uk",
    "publicguardian.gov.uk",
    "cica.gov.uk",
    "ima-citizensrights.org.uk",
];

const AS_ORG_ALLOWED_EMAIL_DOMAINS: &[&str] = &[
    "digital.justice.gov.uk",
    "justice.gov.uk",
    "publicguardian.gov.uk",
    "judicialappointments.gov.uk",
    "judiciary.uk",
    "ppo.gov.uk",
    "sentencingcouncil.gov.uk",
    "yjb.gov.uk",
];

/// Errors raised while building a policy table.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("organisation identifier must not be empty")]
    EmptyIdentifier,
    #[error("organisation '{0}' is listed more than once")]
    DuplicateOrganisation(String),
    #[error("organisation '{0}' is enabled but allows no email domains")]
    EmptyDomainSet(String),
    #[error("invalid organisation policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only mapping from organisation to its pre-approved email domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicyTable {
    organisations: Vec<Organisation>,
}

impl DomainPolicyTable {
    /// Identifiers and domains are case-folded on the way in.
    pub fn new(organisations: Vec<Organisation>) -> Result<Self, PolicyError> {
        let mut normalised: Vec<Organisation> = Vec::with_capacity(organisations.len());

        for organisation in organisations {
            let id = normalise(&organisation.id);
            if id.is_empty() {
                return Err(PolicyError::EmptyIdentifier);
            }
            if normalised.iter().any(|existing| existing.id == id) {
                return Err(PolicyError::DuplicateOrganisation(id));
            }

            let allowed_domains: BTreeSet<String> = organisation
                .allowed_domains
                .iter()
                .map(|domain| normalise(domain))
                .filter(|domain| !domain.is_empty())
                .collect();
            if organisation.enabled && allowed_domains.is_empty() {
                return Err(PolicyError::EmptyDomainSet(id));
            }

            let label = if organisation.label.trim().is_empty() {
                id.clone()
            } else {
                organisation.label.trim().to_string()
            };

            normalised.push(Organisation {
                id,
                label,
                enabled: organisation.enabled,
                allowed_domains,
            });
        }

        Ok(Self {
            organisations: normalised,
        })
    }

    /// The two Ministry of Justice organisations with their production allow-lists.
    pub fn ministry_of_justice() -> Self {
        Self {
            organisations: vec![
                organisation(
                    MINISTRY_OF_JUSTICE,
                    "Ministry of Justice",
                    MOJ_ORG_ALLOWED_EMAIL_DOMAINS,
                ),
                organisation(
                    MOJ_ANALYTICAL_SERVICES,
                    "MoJ Analytical Services",
                    AS_ORG_ALLOWED_EMAIL_DOMAINS,
                ),
            ],
        }
    }

    /// Load a table from a JSON array of organisations.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, PolicyError> {
        let organisations: Vec<Organisation> = serde_json::from_reader(reader)?;
        Self::new(organisations)
    }

    pub fn organisations(&self) -> &[Organisation] {
        &self.organisations
    }

    /// Look up an enabled organisation. Unknown and disabled identifiers are unmanaged.
    pub fn managed(&self, organisation: &str) -> Option<&Organisation> {
        let id = normalise(organisation);
        self.organisations
            .iter()
            .find(|candidate| candidate.enabled && candidate.id == id)
    }

    pub fn is_managed(&self, organisation: &str) -> bool {
        self.managed(organisation).is_some()
    }

    /// Identifiers of every enabled organisation, in configuration order.
    pub fn managed_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.organisations
            .iter()
            .filter(|organisation| organisation.enabled)
            .map(|organisation| organisation.id.as_str())
    }

    /// Never fails: malformed input simply is not pre-approved.
    pub fn is_pre_approved(&self, organisation: &str, email_address: &str) -> bool {
        let Some(domain) = email_domain(email_address) else {
            return false;
        };

        self.managed(organisation)
            .map(|organisation| organisation.allowed_domains.contains(&domain))
            .unwrap_or(false)
    }

    /// Whether any managed organisation pre-approves this address.
    pub fn is_allowed_anywhere(&self, email_address: &str) -> bool {
        let Some(domain) = email_domain(email_address) else {
            return false;
        };

        self.organisations.iter().any(|organisation| {
            organisation.enabled && organisation.allowed_domains.contains(&domain)
        })
    }

    /// Translate the join form's two check boxes into organisation identifiers.
    pub fn select_organisations(ministry_of_justice: bool, analytical_services: bool) -> Vec<String> {
        let mut organisations = Vec::new();
        if ministry_of_justice {
            organisations.push(MINISTRY_OF_JUSTICE.to_string());
        }
        if analytical_services {
            organisations.push(MOJ_ANALYTICAL_SERVICES.to_string());
        }
        organisations
    }
}

impl Default for DomainPolicyTable {
    fn default() -> Self {
        Self::ministry_of_justice()
    }
}

fn organisation(id: &str, label: &str, domains: &[&str]) -> Organisation {
    Organisation {
        id: id.to_string(),
        label: label.to_string(),
        enabled: true,
        allowed_domains: domains.iter().map(|domain| domain.to_string()).collect(),
    }
}

fn normalise(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Case-folded text after the first `@`, if there is any.
pub(crate) fn email_domain(email_address: &str) -> Option<String> {
    let (_, domain) = email_address.trim().split_once('@')?;
    let domain = normalise(domain);
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}
