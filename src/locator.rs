//! Resolution of logical service locations to base URLs.
//!
//! The platform runs separate stacks per environment (production vs.
//! integration) and per data residency (US vs. EMEA). Only the locations the
//! identity handshake needs are tabulated here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// A logical API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Residency-independent API (token info, global lookups).
    GlobalApi,
    /// Regional Insight API; hosts `/aims/v1`.
    InsightApi,
    /// Regional Gestalt aggregation API.
    GestaltApi,
}

/// Deployment environment.
///
/// Several environment names used by consoles collapse onto the same stack,
/// so parsing accepts all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Environment {
    /// Production and its staging aliases.
    #[default]
    Production,
    /// Integration / development stack.
    Integration,
}

impl FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "beta-nav-prod" | "production-staging" => Ok(Environment::Production),
            "integration" | "beta-navigation" | "development" => Ok(Environment::Integration),
            other => Err(AuthError::Config {
                message: format!("unknown environment '{other}'"),
                source: None,
            }),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Environment> for String {
    fn from(value: Environment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Integration => f.write_str("integration"),
        }
    }
}

/// Data residency region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Residency {
    /// United States.
    #[default]
    Us,
    /// Europe, Middle East and Africa (UK-hosted).
    Emea,
}

impl FromStr for Residency {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Residency::Us),
            "EMEA" => Ok(Residency::Emea),
            other => Err(AuthError::Config {
                message: format!("unknown residency '{other}'"),
                source: None,
            }),
        }
    }
}

impl TryFrom<String> for Residency {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Residency> for String {
    fn from(value: Residency) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residency::Us => f.write_str("US"),
            Residency::Emea => f.write_str("EMEA"),
        }
    }
}

struct Location {
    service: Service,
    environment: Environment,
    /// `None` means the entry serves every residency.
    residency: Option<Residency>,
    uri: &'static str,
}

const LOCATIONS: &[Location] = &[
    Location {
        service: Service::GlobalApi,
        environment: Environment::Production,
        residency: None,
        uri: "https://api.global.alertlogic.com",
    },
    Location {
        service: Service::GlobalApi,
        environment: Environment::Integration,
        residency: None,
        uri: "https://api.global-integration.product.dev.alertlogic.com",
    },
    Location {
        service: Service::InsightApi,
        environment: Environment::Production,
        residency: Some(Residency::Us),
        uri: "https://api.cloudinsight.alertlogic.com",
    },
    Location {
        service: Service::InsightApi,
        environment: Environment::Production,
        residency: Some(Residency::Emea),
        uri: "https://api.cloudinsight.alertlogic.co.uk",
    },
    Location {
        service: Service::InsightApi,
        environment: Environment::Integration,
        residency: Some(Residency::Us),
        uri: "https://api.product.dev.alertlogic.com",
    },
    Location {
        service: Service::GestaltApi,
        environment: Environment::Integration,
        residency: None,
        uri: "https://gestalt-api.product.dev.alertlogic.com",
    },
    Location {
        service: Service::GestaltApi,
        environment: Environment::Production,
        residency: Some(Residency::Emea),
        uri: "https://gestalt.cloudinsight.alertlogic.co.uk",
    },
    Location {
        service: Service::GestaltApi,
        environment: Environment::Production,
        residency: Some(Residency::Us),
        uri: "https://gestalt.cloudinsight.alertlogic.com",
    },
];

/// Resolves a service to its base URL (no trailing slash).
///
/// An entry whose residency matches exactly wins over a residency-less one.
/// If neither exists for the requested residency, the US entry of the same
/// environment is used; integration stacks exist only in the US.
pub fn resolve(service: Service, environment: Environment, residency: Residency) -> &'static str {
    let candidates = || {
        LOCATIONS
            .iter()
            .filter(move |l| l.service == service && l.environment == environment)
    };

    candidates()
        .find(|l| l.residency == Some(residency))
        .or_else(|| candidates().find(|l| l.residency.is_none()))
        .or_else(|| candidates().find(|l| l.residency == Some(Residency::Us)))
        .map(|l| l.uri)
        // Every (service, environment) pair has at least one entry.
        .unwrap_or(LOCATIONS[0].uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insight_api_follows_residency_in_production() {
        assert_eq!(
            resolve(Service::InsightApi, Environment::Production, Residency::Us),
            "https://api.cloudinsight.alertlogic.com"
        );
        assert_eq!(
            resolve(Service::InsightApi, Environment::Production, Residency::Emea),
            "https://api.cloudinsight.alertlogic.co.uk"
        );
    }

    #[test]
    fn integration_emea_falls_back_to_us_stack() {
        assert_eq!(
            resolve(Service::InsightApi, Environment::Integration, Residency::Emea),
            "https://api.product.dev.alertlogic.com"
        );
    }

    #[test]
    fn residency_less_entries_serve_every_region() {
        let us = resolve(Service::GlobalApi, Environment::Production, Residency::Us);
        let emea = resolve(Service::GlobalApi, Environment::Production, Residency::Emea);
        assert_eq!(us, emea);
        assert_eq!(us, "https://api.global.alertlogic.com");
    }

    #[test]
    fn every_service_resolves_in_every_environment() {
        for service in [Service::GlobalApi, Service::InsightApi, Service::GestaltApi] {
            for environment in [Environment::Production, Environment::Integration] {
                for residency in [Residency::Us, Residency::Emea] {
                    let uri = resolve(service, environment, residency);
                    assert!(uri.starts_with("https://"), "{service:?}/{environment}/{residency}");
                    assert!(!uri.ends_with('/'));
                }
            }
        }
    }

    #[test]
    fn environment_aliases_parse() {
        assert_eq!("beta-nav-prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("production-staging".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Integration);
        assert_eq!("Integration".parse::<Environment>().unwrap(), Environment::Integration);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn residency_parses_case_insensitively() {
        assert_eq!("emea".parse::<Residency>().unwrap(), Residency::Emea);
        assert_eq!("US".parse::<Residency>().unwrap(), Residency::Us);
        assert!("APAC".parse::<Residency>().is_err());
    }
}
