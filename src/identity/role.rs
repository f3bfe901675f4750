//! Role registry: the closed role enumeration, the business domains, and the
//! total mappings from role to capability set and landing destination.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::AuthError;

/// Business area gating access to its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "cybersecurity")]
    Cybersecurity,
    #[serde(rename = "datascience")]
    DataScience,
    #[serde(rename = "itoperations")]
    ItOperations,
}

const ALL_DOMAINS: &[Domain] = &[Domain::Cybersecurity, Domain::DataScience, Domain::ItOperations];

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Cybersecurity, Domain::DataScience, Domain::ItOperations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Cybersecurity => "cybersecurity",
            Domain::DataScience => "datascience",
            Domain::ItOperations => "itoperations",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Domain::Cybersecurity => "Cybersecurity Operations",
            Domain::DataScience => "Data Science Analytics",
            Domain::ItOperations => "IT Operations Management",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Domain {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cybersecurity" => Ok(Domain::Cybersecurity),
            "datascience" => Ok(Domain::DataScience),
            "itoperations" => Ok(Domain::ItOperations),
            _ => Err(AuthError::NotFound(format!("domain {}", s))),
        }
    }
}

/// Closed role enumeration. Anything else is rejected, never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    CybersecurityAnalyst,
    DataScientist,
    ItEngineer,
    Administrator,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::CybersecurityAnalyst, Role::DataScientist, Role::ItEngineer, Role::Administrator];

    /// Canonical identifier, as persisted in the users table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::CybersecurityAnalyst => "cybersecurity-analyst",
            Role::DataScientist => "data-scientist",
            Role::ItEngineer => "it-engineer",
            Role::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = AuthError;

    /// Accepts canonical ids case-insensitively, plus the short legacy ids
    /// (`cybersecurity`, `datascience`, `itoperations`, `admin`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cybersecurity-analyst" | "cybersecurity" => Ok(Role::CybersecurityAnalyst),
            "data-scientist" | "datascience" => Ok(Role::DataScientist),
            "it-engineer" | "itoperations" => Ok(Role::ItEngineer),
            "administrator" | "admin" => Ok(Role::Administrator),
            _ => Err(AuthError::InvalidRole(s.to_string())),
        }
    }
}

/// Set of domains an identity may act within. Always one of the static sets
/// handed out by `capabilities_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet(&'static [Domain]);

impl CapabilitySet {
    pub fn contains(&self, domain: Domain) -> bool { self.0.contains(&domain) }
    pub fn iter(&self) -> impl Iterator<Item = Domain> + '_ { self.0.iter().copied() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn as_slice(&self) -> &'static [Domain] { self.0 }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Default view a role is routed to after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination(Domain);

impl Destination {
    pub fn domain(&self) -> Domain { self.0 }
    pub fn path(&self) -> String { format!("/dashboard/{}", self.0.as_str()) }
}

impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

pub fn capabilities_of(role: Role) -> CapabilitySet {
    match role {
        Role::CybersecurityAnalyst => CapabilitySet(&[Domain::Cybersecurity]),
        Role::DataScientist => CapabilitySet(&[Domain::DataScience]),
        Role::ItEngineer => CapabilitySet(&[Domain::ItOperations]),
        Role::Administrator => CapabilitySet(ALL_DOMAINS),
    }
}

/// Administrator lands on the cybersecurity dashboard by convention; it is
/// not derived from capability breadth.
pub fn landing_page_of(role: Role) -> Destination {
    match role {
        Role::CybersecurityAnalyst => Destination(Domain::Cybersecurity),
        Role::DataScientist => Destination(Domain::DataScience),
        Role::ItEngineer => Destination(Domain::ItOperations),
        Role::Administrator => Destination(Domain::Cybersecurity),
    }
}

pub fn display_name_of(role: Role) -> &'static str {
    match role {
        Role::CybersecurityAnalyst => "Cybersecurity Analyst",
        Role::DataScientist => "Data Scientist",
        Role::ItEngineer => "IT Operations Engineer",
        Role::Administrator => "System Administrator",
    }
}
