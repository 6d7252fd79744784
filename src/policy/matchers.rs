// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-method rule matchers.

use std::net::IpAddr;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};

use super::{PolicyMethod, RequestContext, SharePolicy};

/// Does `policy` match the request?
///
/// Region, MAC and Device always report `false`: the request context carries
/// no geo lookup and no client-supplied hardware identifiers.
pub fn matches(policy: &SharePolicy, ctx: &RequestContext) -> bool {
    match policy.method {
        PolicyMethod::Ip => match_ip(&policy.value, &ctx.client_ip),
        PolicyMethod::Network => match_network(&policy.value, &ctx.client_ip),
        PolicyMethod::Time => match_time_window(&policy.value, ctx),
        PolicyMethod::Region | PolicyMethod::Mac | PolicyMethod::Device => false,
    }
}

/// Exact comparison of the trimmed strings.
pub fn match_ip(policy_value: &str, client_ip: &str) -> bool {
    let client_ip = client_ip.trim();
    !client_ip.is_empty() && policy_value.trim() == client_ip
}

/// CIDR containment. Unparsable range or address never matches.
pub fn match_network(policy_value: &str, client_ip: &str) -> bool {
    let Ok(cidr) = policy_value.trim().parse::<Cidr>() else {
        return false;
    };
    let Ok(ip) = client_ip.trim().parse::<IpAddr>() else {
        return false;
    };
    cidr.contains(&ip)
}

/// Inclusive UTC time-of-day window, wrapping past midnight when start > end.
pub fn match_time_window(policy_value: &str, ctx: &RequestContext) -> bool {
    let Some(window) = parse_time_window(policy_value) else {
        return false;
    };
    let now = ctx.now.time();
    window.contains_minute(now.hour() * 60 + now.minute())
}

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid CIDR notation")]
pub struct CidrParseError;

impl Cidr {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').ok_or(CidrParseError)?;
        let network: IpAddr = addr.parse().map_err(|_| CidrParseError)?;
        let prefix: u8 = prefix.parse().map_err(|_| CidrParseError)?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(CidrParseError);
        }
        Ok(Self { network, prefix })
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

/// `HH:MM-HH:MM` window in minutes since midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl TimeWindow {
    pub fn contains_minute(&self, minute: u32) -> bool {
        if self.start_minute <= self.end_minute {
            minute >= self.start_minute && minute <= self.end_minute
        } else {
            minute >= self.start_minute || minute <= self.end_minute
        }
    }
}

pub fn parse_time_window(value: &str) -> Option<TimeWindow> {
    let (start, end) = value.split_once('-')?;
    Some(TimeWindow {
        start_minute: parse_clock(start)?,
        end_minute: parse_clock(end)?,
    })
}

fn parse_clock(value: &str) -> Option<u32> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}
