//! Range expansion: turn a CIDR block or bare IPv4 address into the ordered
//! list of candidate addresses a scan will visit.
//!
//! Ranges up to a /24 are enumerated host by host (last octet capped at 254).
//! Anything wider is cut down to the first `cap` host addresses of the
//! network so a single request cannot turn into a sweep of a /8.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use ipnet::Ipv4Net;
use regex::Regex;

use crate::error::{DiscoverError, Result};

/// Result of expanding an `ipRange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub addresses: Vec<Ipv4Addr>,
    /// True when the range was wider than a /24 and got capped.
    pub truncated: bool,
}

impl Expansion {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

fn cidr_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:/(\d{1,2}))?$")
            .expect("Invalid CIDR Regex")
    })
}

/// Parse `a.b.c.d` or `a.b.c.d/p` strictly. No I/O happens before this passes.
pub fn parse_range(input: &str) -> Result<(Ipv4Addr, Option<u8>)> {
    let invalid = || DiscoverError::InvalidRange {
        input: input.to_string(),
    };

    let caps = cidr_regex().captures(input.trim()).ok_or_else(invalid)?;

    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = caps[i + 1].parse().map_err(|_| invalid())?;
    }

    let prefix = match caps.get(5) {
        Some(m) => {
            let p: u8 = m.as_str().parse().map_err(|_| invalid())?;
            if p > 32 {
                return Err(invalid());
            }
            Some(p)
        }
        None => None,
    };

    Ok((Ipv4Addr::from(octets), prefix))
}

/// Validate without expanding.
pub fn validate_range(input: &str) -> Result<()> {
    parse_range(input).map(|_| ())
}

/// Expand `input` into candidate addresses. Pure: same input, same output.
pub fn expand_range(input: &str, cap: u32) -> Result<Expansion> {
    let (base, prefix) = parse_range(input)?;

    let Some(prefix) = prefix else {
        return Ok(Expansion {
            addresses: vec![base],
            truncated: false,
        });
    };

    let net = Ipv4Net::new(base, prefix).map_err(|_| DiscoverError::InvalidRange {
        input: input.to_string(),
    })?;
    let network = u32::from(net.network());
    let broadcast = u32::from(net.broadcast());

    let (first, last, truncated) = match prefix {
        32 => (u32::from(base), u32::from(base), false),
        31 => (network, broadcast, false),
        24..=30 => {
            // Same /24 for every address here, so cap the last octet at .254.
            let ceiling = (network & 0xFFFF_FF00) | 254;
            (network + 1, (broadcast - 1).min(ceiling), false)
        }
        _ => {
            let last = network.saturating_add(cap).min(broadcast - 1);
            (network + 1, last, true)
        }
    };

    let addresses: Vec<Ipv4Addr> = if first > last {
        Vec::new()
    } else {
        (first..=last).map(Ipv4Addr::from).collect()
    };

    if truncated {
        tracing::warn!(
            range = %input.trim(),
            prefix,
            candidates = addresses.len(),
            "Range wider than /24, scanning only the first hosts of the network"
        );
    }

    Ok(Expansion {
        addresses,
        truncated,
    })
}
