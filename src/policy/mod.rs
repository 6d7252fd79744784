// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Access Policies
//!
//! A share link may carry any number of [`SharePolicy`] rules. Each rule is a
//! blacklist or whitelist entry on one [`PolicyMethod`]. Evaluation runs per
//! method:
//!
//! 1. A matching blacklist rule denies (its reason, or a default one).
//! 2. Otherwise, if the method has whitelist rules, one of them must match.
//!
//! Methods are ANDed together; a method without rules never restricts, and a
//! link without rules is open to everyone.
//!
//! Region, MAC and Device rules need signals the request context does not
//! carry. Their matchers never match; the engine warns whenever it meets one
//! and names the method as unevaluable when a whitelist of it denies.

pub mod matchers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

pub use matchers::{parse_time_window, Cidr, TimeWindow};

/// Whether a rule denies on match or requires a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    Blacklist,
    Whitelist,
}

/// The request dimension a rule restricts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyMethod {
    /// Exact client IP.
    Ip,
    /// CIDR range containing the client IP.
    Network,
    /// Geographic region (needs GeoIP, not available).
    Region,
    /// UTC time-of-day window `HH:MM-HH:MM`.
    Time,
    /// Client MAC address (not available).
    Mac,
    /// Client device identifier (not available).
    Device,
}

impl PolicyMethod {
    /// Evaluation order. Fixed so denial reasons are deterministic.
    pub const ALL: [PolicyMethod; 6] = [
        PolicyMethod::Ip,
        PolicyMethod::Network,
        PolicyMethod::Region,
        PolicyMethod::Time,
        PolicyMethod::Mac,
        PolicyMethod::Device,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMethod::Ip => "IP",
            PolicyMethod::Network => "NETWORK",
            PolicyMethod::Region => "REGION",
            PolicyMethod::Time => "TIME",
            PolicyMethod::Mac => "MAC",
            PolicyMethod::Device => "DEVICE",
        }
    }

    /// Whether the request context carries what this method needs.
    pub fn is_evaluable(&self) -> bool {
        matches!(
            self,
            PolicyMethod::Ip | PolicyMethod::Network | PolicyMethod::Time
        )
    }
}

impl std::fmt::Display for PolicyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access restriction attached to exactly one share link.
///
/// Immutable once stored; policies are only ever created or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SharePolicy {
    /// Unique policy identifier (UUID)
    pub id: String,
    /// Tenant that owns the share link
    pub tenant_id: u32,
    /// Owning share link
    pub share_link_id: String,
    /// Blacklist or whitelist
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Restricted dimension
    pub method: PolicyMethod,
    /// Match value (IP, CIDR, region code, time window, MAC, device id)
    pub value: String,
    /// Human-readable explanation, reported on blacklist denial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Creator user ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy value must not be empty")]
    EmptyValue,

    #[error("invalid IP address for IP policy: {0}")]
    InvalidIp(String),

    #[error("invalid CIDR range for NETWORK policy: {0}")]
    InvalidCidr(String),

    #[error("invalid time window for TIME policy (expected HH:MM-HH:MM): {0}")]
    InvalidTimeWindow(String),
}

/// Check a policy value against its method before it is stored.
pub fn validate_value(method: PolicyMethod, value: &str) -> Result<(), PolicyError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PolicyError::EmptyValue);
    }
    match method {
        PolicyMethod::Ip => value
            .parse::<std::net::IpAddr>()
            .map(|_| ())
            .map_err(|_| PolicyError::InvalidIp(value.to_string())),
        PolicyMethod::Network => value
            .parse::<Cidr>()
            .map(|_| ())
            .map_err(|_| PolicyError::InvalidCidr(value.to_string())),
        PolicyMethod::Time => parse_time_window(value)
            .map(|_| ())
            .ok_or_else(|| PolicyError::InvalidTimeWindow(value.to_string())),
        PolicyMethod::Region | PolicyMethod::Mac | PolicyMethod::Device => Ok(()),
    }
}

/// What the engine knows about the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Client IP as reported by the transport (may be empty when unknown).
    pub client_ip: String,
    /// Evaluation instant; TIME rules use its UTC time of day.
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            client_ip: client_ip.into(),
            now,
        }
    }

    /// Context for a request arriving right now.
    pub fn at_now(client_ip: impl Into<String>) -> Self {
        Self::new(client_ip, Utc::now())
    }
}

/// Outcome of evaluating a link's policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Stateless evaluator over a link's policy set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, policies: &[SharePolicy], ctx: &RequestContext) -> Decision {
        for method in PolicyMethod::ALL {
            let group: Vec<&SharePolicy> =
                policies.iter().filter(|p| p.method == method).collect();
            if group.is_empty() {
                continue;
            }

            if !method.is_evaluable() {
                warn!(
                    method = %method,
                    rules = group.len(),
                    "Share carries policies the request context cannot evaluate"
                );
            }

            let blacklisted = group
                .iter()
                .filter(|p| p.policy_type == PolicyType::Blacklist)
                .find(|p| matchers::matches(p, ctx));
            if let Some(hit) = blacklisted {
                let reason = hit
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("blocked by {method} blacklist policy"));
                return Decision::Deny { reason };
            }

            let mut whitelist = group
                .iter()
                .filter(|p| p.policy_type == PolicyType::Whitelist)
                .peekable();
            if whitelist.peek().is_some() && !whitelist.any(|p| matchers::matches(p, ctx)) {
                let reason = if method.is_evaluable() {
                    format!("access denied: not in {method} whitelist")
                } else {
                    format!("access denied: {method} whitelist cannot be evaluated for this request")
                };
                return Decision::Deny { reason };
            }
        }

        Decision::Allow
    }
}
