//! Access guard for the upload endpoint.
//!
//! Two checks, always in this order:
//!
//! 1. **Caller address**: when `checkIP` is on, the caller's host (port
//!    stripped) must exactly match an `allowedIPs` entry.
//! 2. **Shared secret**: the `key` field must equal `secretKey`, compared
//!    in constant time.
//!
//! Denials are logged here with the rejected address and reason.

use crate::config::Config;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Why a caller was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Address not in the allowlist.
    Forbidden,
    /// Missing or wrong secret.
    Unauthorized,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Forbidden => f.write_str("forbidden"),
            Denial::Unauthorized => f.write_str("unauthorized"),
        }
    }
}

/// Run both checks: address first, then secret.
pub fn authorize(caller: &str, secret: Option<&str>, config: &Config) -> Result<(), Denial> {
    check_caller(caller, config)?;
    check_secret(caller, secret, config)
}

/// Check the caller's address against the allowlist.
///
/// Always passes when IP checking is disabled, whatever the allowlist holds.
pub fn check_caller(caller: &str, config: &Config) -> Result<(), Denial> {
    if !config.check_ip {
        return Ok(());
    }

    let host = caller_host(caller);
    if config.allowed_ips.iter().any(|allowed| allowed.trim() == host) {
        return Ok(());
    }

    tracing::warn!(caller = %caller, ip = %host, reason = %Denial::Forbidden, "Rejected IP");
    Err(Denial::Forbidden)
}

/// Check the supplied secret against the configured one.
pub fn check_secret(caller: &str, secret: Option<&str>, config: &Config) -> Result<(), Denial> {
    let matches = secret.is_some_and(|s| constant_time_eq(s.as_bytes(), config.secret_key.as_bytes()));
    if matches {
        return Ok(());
    }

    tracing::warn!(
        caller = %caller,
        reason = %Denial::Unauthorized,
        key_present = secret.is_some(),
        "Rejected secret key"
    );
    Err(Denial::Unauthorized)
}

/// Host part of a caller address, with any port suffix stripped.
///
/// Handles `1.2.3.4:5678`, `[::1]:5678`, bare IPv4/IPv6 addresses and, as a
/// fallback, `host:port` strings that are not IP literals. IPv4-mapped IPv6
/// addresses are reported in their IPv4 form.
pub fn caller_host(caller: &str) -> String {
    if let Ok(addr) = caller.parse::<SocketAddr>() {
        return canonical_ip(addr.ip());
    }
    if let Ok(ip) = caller.parse::<IpAddr>() {
        return canonical_ip(ip);
    }
    match caller.rsplit_once(':') {
        Some((host, _port)) => host.trim_start_matches('[').trim_end_matches(']').to_string(),
        None => caller.to_string(),
    }
}

fn canonical_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Only the length is allowed to leak.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
