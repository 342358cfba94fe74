//! Provider/requester directory and the authenticated caller.
//!
//! Profiles hold public projection fields only. Credentials are issued and checked by
//! an external identity service; the engine receives an already-authenticated
//! [`Principal`] per call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

macro_rules! party_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

party_id!(ProviderId);
party_id!(RequesterId);

/// Which side of a booking a caller acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Provider,
    Requester,
}

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn provider(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Provider,
        }
    }

    pub fn requester(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Requester,
        }
    }

    /// True when the caller acts as exactly this provider.
    pub fn is_provider(&self, provider: &ProviderId) -> bool {
        self.role == Role::Provider && self.id == provider.0
    }

    /// True when the caller acts as exactly this requester.
    pub fn is_requester(&self, requester: &RequesterId) -> bool {
        self.role == Role::Requester && self.id == requester.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Provider => "provider",
            Role::Requester => "requester",
        };
        write!(f, "{}:{}", role, self.id)
    }
}

/// Parses `provider:<id>` or `requester:<id>`.
impl FromStr for Principal {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let (role, id) = s
            .split_once(':')
            .ok_or_else(|| EngineError::InvalidPrincipal(s.to_string()))?;
        if id.is_empty() {
            return Err(EngineError::InvalidPrincipal(s.to_string()));
        }
        match role {
            "provider" => Ok(Principal::provider(id)),
            "requester" => Ok(Principal::requester(id)),
            _ => Err(EngineError::InvalidPrincipal(s.to_string())),
        }
    }
}

/// Public profile of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub email: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
}

/// Public profile of a requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: RequesterId,
    pub name: String,
    pub email: String,
}

/// Where a notification is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

impl From<&Provider> for Contact {
    fn from(provider: &Provider) -> Self {
        Self {
            name: provider.name.clone(),
            email: provider.email.clone(),
        }
    }
}

impl From<&Requester> for Contact {
    fn from(requester: &Requester) -> Self {
        Self {
            name: requester.name.clone(),
            email: requester.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    providers: BTreeMap<ProviderId, Provider>,
    requesters: BTreeMap<RequesterId, Requester>,
}

impl Directory {
    pub fn add_provider(&mut self, provider: Provider) -> Result<()> {
        if self.providers.contains_key(&provider.id) {
            return Err(EngineError::DuplicateParty(format!("provider {}", provider.id)));
        }
        self.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    pub fn add_requester(&mut self, requester: Requester) -> Result<()> {
        if self.requesters.contains_key(&requester.id) {
            return Err(EngineError::DuplicateParty(format!("requester {}", requester.id)));
        }
        self.requesters.insert(requester.id.clone(), requester);
        Ok(())
    }

    pub fn provider(&self, id: &ProviderId) -> Result<&Provider> {
        self.providers
            .get(id)
            .ok_or_else(|| EngineError::ProviderNotFound(id.clone()))
    }

    pub fn requester(&self, id: &RequesterId) -> Result<&Requester> {
        self.requesters
            .get(id)
            .ok_or_else(|| EngineError::RequesterNotFound(id.clone()))
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn requesters(&self) -> impl Iterator<Item = &Requester> {
        self.requesters.values()
    }
}
