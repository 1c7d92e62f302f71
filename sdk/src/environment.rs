//! Registry of Partner Center cloud environments.
//!
//! Each environment pins the Azure AD authority together with the resource
//! endpoints tokens are minted for. The registry is read-only after
//! initialization; callers resolve entries by name and never mutate them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Well-known Partner Center cloud environments.
///
/// Mirrors the set of sovereign clouds the Partner Center service is
/// deployed to. Used in configuration files and when constructing a
/// [`CredentialContext`](crate::auth::CredentialContext).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentName {
    /// The worldwide public cloud (login.microsoftonline.com)
    GlobalCloud,
    /// Azure China, operated by 21Vianet
    ChinaCloud,
    /// Azure Germany
    GermanCloud,
    /// Azure US Government
    UsGovernment,
}

impl EnvironmentName {
    fn as_str(&self) -> &'static str {
        match self {
            EnvironmentName::GlobalCloud => "global_cloud",
            EnvironmentName::ChinaCloud => "china_cloud",
            EnvironmentName::GermanCloud => "german_cloud",
            EnvironmentName::UsGovernment => "us_government",
        }
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentName {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global_cloud" => Ok(EnvironmentName::GlobalCloud),
            "china_cloud" => Ok(EnvironmentName::ChinaCloud),
            "german_cloud" => Ok(EnvironmentName::GermanCloud),
            "us_government" => Ok(EnvironmentName::UsGovernment),
            _ => Err(AuthError::UnknownEnvironment {
                name: s.to_string(),
            }),
        }
    }
}

/// Service endpoints for a single Partner Center cloud environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartnerEnvironment {
    /// Azure AD authority host, with a trailing slash. The tenant segment
    /// is appended when building the per-tenant authority URL.
    pub active_directory_authority: &'static str,
    /// The Partner Center API resource tokens are requested for.
    pub partner_center_endpoint: &'static str,
    /// The Azure AD Graph resource used by service principal exchanges.
    pub graph_endpoint: &'static str,
}

static ENVIRONMENTS: Lazy<HashMap<EnvironmentName, PartnerEnvironment>> = Lazy::new(|| {
    HashMap::from([
        (
            EnvironmentName::GlobalCloud,
            PartnerEnvironment {
                active_directory_authority: "https://login.microsoftonline.com/",
                partner_center_endpoint: "https://api.partnercenter.microsoft.com",
                graph_endpoint: "https://graph.windows.net",
            },
        ),
        (
            EnvironmentName::ChinaCloud,
            PartnerEnvironment {
                active_directory_authority: "https://login.chinacloudapi.cn/",
                partner_center_endpoint: "https://partner.partnercenterapi.partnercenter.cn",
                graph_endpoint: "https://graph.chinacloudapi.cn",
            },
        ),
        (
            EnvironmentName::GermanCloud,
            PartnerEnvironment {
                active_directory_authority: "https://login.microsoftonline.de/",
                partner_center_endpoint: "https://partnercenter.microsoft.de",
                graph_endpoint: "https://graph.cloudapi.de",
            },
        ),
        (
            EnvironmentName::UsGovernment,
            PartnerEnvironment {
                active_directory_authority: "https://login.microsoftonline.us/",
                partner_center_endpoint: "https://api.partnercenter.microsoft.com",
                graph_endpoint: "https://graph.windows.net",
            },
        ),
    ])
});

impl PartnerEnvironment {
    /// Resolves the endpoint set for a known environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEnvironment`] if the registry has no
    /// entry for the requested name.
    pub fn lookup(name: EnvironmentName) -> Result<&'static PartnerEnvironment, AuthError> {
        ENVIRONMENTS
            .get(&name)
            .ok_or_else(|| AuthError::UnknownEnvironment {
                name: name.to_string(),
            })
    }

    /// Resolves an environment from its configured string name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEnvironment`] if the name does not
    /// identify a registered environment.
    pub fn lookup_by_name(name: &str) -> Result<&'static PartnerEnvironment, AuthError> {
        let parsed: EnvironmentName = name.parse()?;
        Self::lookup(parsed)
    }

    /// Builds the tenant-specific authority URL for this environment.
    pub fn authority_url(&self, tenant: &str) -> String {
        format!("{}{}", self.active_directory_authority, tenant)
    }
}
