use std::net::Ipv4Addr;

/// Configured set of addresses allowed through the gate.
///
/// Entries are exact addresses, `*`, or CIDR-shaped `a.b.c.d/n`. CIDR
/// entries compare whole dotted octets: `ceil(n / 8)` leading octets of the
/// address must equal those of the network, so `/20` behaves like `/24`.
#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    entries: Vec<String>,
}

impl IpAllowList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| entry.as_ref().trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    /// An empty list allows everyone.
    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn permits(&self, address: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        let address = normalize_ip(address);
        self.entries
            .iter()
            .any(|entry| entry_matches(entry, &address))
    }
}

fn entry_matches(entry: &str, address: &str) -> bool {
    if entry == "*" || entry == address {
        return true;
    }
    let Some((network, prefix)) = entry.split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.trim().parse::<u32>() else {
        return false;
    };
    let octets = prefix.div_ceil(8) as usize;
    let leading = |ip: &str| ip.split('.').take(octets).collect::<Vec<_>>().join(".");
    leading(network.trim()) == leading(address)
}

/// Strips the IPv4-mapped IPv6 prefix (`::ffff:10.0.0.1` becomes `10.0.0.1`).
pub fn normalize_ip(raw: &str) -> String {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    match lower.strip_prefix("::ffff:") {
        Some(v4) if v4.parse::<Ipv4Addr>().is_ok() => v4.to_string(),
        _ => raw.to_string(),
    }
}
