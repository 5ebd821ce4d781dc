//! Peer discovery over the peer relation.

use dns_lookup::{getaddrinfo, AddrInfoHints};
use tracing::debug;

use mimir_config::PeerSet;

use crate::relation::RelationView;

/// Field each unit publishes its address under.
pub const PEER_HOSTNAME_FIELD: &str = "peer_hostname";

/// Resolves the local unit's view of cluster membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDirectory {
    local_unit: String,
    local_address: String,
}

impl PeerDirectory {
    /// Creates a directory for `local_unit` reachable at `local_address`.
    #[must_use]
    pub fn new(local_unit: impl Into<String>, local_address: impl Into<String>) -> Self {
        Self {
            local_unit: local_unit.into(),
            local_address: local_address.into(),
        }
    }

    /// Creates a directory using this machine's fully qualified hostname as
    /// the address.
    ///
    /// Falls back to the short hostname when it has no canonical name, and to
    /// `localhost` if the hostname cannot be read.
    #[must_use]
    pub fn detect(local_unit: impl Into<String>) -> Self {
        let short = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(local_unit, qualify(short, canonical_hostname))
    }

    /// The local unit identifier.
    #[must_use]
    pub fn local_unit(&self) -> &str {
        &self.local_unit
    }

    /// The local address.
    #[must_use]
    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Build the peer set from the relation's current data.
    ///
    /// Remote units that have not published a hostname yet are left out.
    #[must_use]
    pub fn resolve_peers(&self, relation: Option<&dyn RelationView>) -> PeerSet {
        let mut peers = PeerSet::new(&self.local_unit, &self.local_address);
        let Some(relation) = relation else {
            return peers;
        };

        for unit in relation.remote_units() {
            match relation.get_field(&unit, PEER_HOSTNAME_FIELD) {
                Some(address) if !address.trim().is_empty() => {
                    peers.insert(unit, address.trim());
                }
                _ => debug!(unit = %unit, "peer has not published a hostname"),
            }
        }
        peers
    }
}

/// Canonical name of `host`, as getaddrinfo reports it with `AI_CANONNAME`.
#[must_use]
pub fn canonical_hostname(host: &str) -> Option<String> {
    let hints = AddrInfoHints {
        flags: libc::AI_CANONNAME,
        ..AddrInfoHints::default()
    };
    let mut infos = match getaddrinfo(Some(host), None, Some(hints)) {
        Ok(infos) => infos,
        Err(e) => {
            debug!(host, error = ?e, "hostname has no canonical name");
            return None;
        }
    };
    infos
        .find_map(|info| info.ok().and_then(|info| info.canonname))
        .filter(|name| !name.trim().is_empty())
}

fn qualify(short: String, resolve: impl FnOnce(&str) -> Option<String>) -> String {
    resolve(&short).unwrap_or(short)
}
