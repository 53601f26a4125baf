//! Entity types for the persistent store.

use std::fmt;
use std::str::FromStr;

/// One identity the user holds. At most one row has `active = true`
/// process-wide; the store enforces that invariant on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub pubkey_hex: String,
    pub pubkey_bech32: String,
    /// Ciphertext produced by [`crate::credential::encrypt`]; never the raw
    /// 64-hex-digit secret key.
    pub encrypted_seckey: String,
    pub active: bool,
}

/// Singleton row seeded on first run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub password_hash: String,
}

/// Cached profile/contacts/dm-relay state for one pubkey, keyed by
/// `pubkey_hex`. Writes are gated by a newer-wins comparison on the
/// relevant `*_updated_at` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub pubkey_hex: String,
    pub bech32: String,
    pub name: String,
    pub display_name: String,
    pub about: String,
    pub nip05: String,
    pub website: String,
    pub lud06: String,
    pub lud16: String,
    pub picture: String,
    pub total_follows: i64,
    pub metadata_updated_at: u64,
    pub contacts_updated_at: u64,
    /// Populated only when the kind-0 `content` JSON failed to parse into
    /// the typed fields above; those are then left at their defaults.
    pub raw_json: Option<String>,
    pub follows: Vec<String>,
    pub dm_relays: Vec<DMRelay>,
}

impl Metadata {
    /// A placeholder row for a pubkey we've only heard referenced (a follow,
    /// a DM-relay-list author) but never received a kind-0/kind-3 event for.
    /// Zero timestamps guarantee the next real event for this pubkey wins
    /// the newer-wins gate.
    pub fn placeholder(pubkey_hex: impl Into<String>) -> Self {
        Self {
            pubkey_hex: pubkey_hex.into(),
            metadata_updated_at: 0,
            contacts_updated_at: 0,
            ..Default::default()
        }
    }
}

/// Preferred relay for direct messages addressed to `pubkey_hex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DMRelay {
    pub pubkey_hex: String,
    pub url: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Published read/write relay preference (NIP-65, kind 10002).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayListEntry {
    pub pubkey_hex: String,
    pub url: String,
    pub read: bool,
    pub write: bool,
}

/// Operational state of a relay the local user is (or was) connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayStatusKind {
    Waiting,
    Established,
    EstablishedEose,
    FailedInitialConnection,
    ConnectionError,
    Deleting,
}

impl RelayStatusKind {
    /// Render the `connection error: <reason>` family with its reason, or
    /// the fixed string for every other variant.
    pub fn display_with_reason(&self, reason: Option<&str>) -> String {
        match self {
            RelayStatusKind::ConnectionError => {
                format!("connection error: {}", reason.unwrap_or("unknown"))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RelayStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayStatusKind::Waiting => "waiting",
            RelayStatusKind::Established => "connection established",
            RelayStatusKind::EstablishedEose => "connection established: EOSE",
            RelayStatusKind::FailedInitialConnection => "failed initial connection",
            RelayStatusKind::ConnectionError => "connection error",
            RelayStatusKind::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

impl FromStr for RelayStatusKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "waiting" => RelayStatusKind::Waiting,
            "connection established" => RelayStatusKind::Established,
            "connection established: EOSE" => RelayStatusKind::EstablishedEose,
            "failed initial connection" => RelayStatusKind::FailedInitialConnection,
            "deleting" => RelayStatusKind::Deleting,
            s if s.starts_with("connection error") => RelayStatusKind::ConnectionError,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    pub url: String,
    pub status: String,
    pub last_eose: u64,
    pub last_disco: u64,
    pub updated_at: u64,
}

impl RelayStatus {
    pub fn kind(&self) -> Option<RelayStatusKind> {
        self.status.parse().ok()
    }

    /// `since = max(last_eose, last_disco)`, the resume horizon used to
    /// scope a relay's catch-up subscription after a reconnect.
    pub fn resume_horizon(&self, now: u64) -> u64 {
        let since = self.last_eose.max(self.last_disco);
        if since == 0 {
            now.saturating_sub(72 * 3600)
        } else {
            since
        }
    }
}

/// One decrypted direct message, keyed by the envelope (kind-1059) event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub event_id: String,
    pub from_pubkey: String,
    pub to_pubkey: String,
    pub content: String,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_status_kind_round_trips_through_display() {
        for kind in [
            RelayStatusKind::Waiting,
            RelayStatusKind::Established,
            RelayStatusKind::EstablishedEose,
            RelayStatusKind::FailedInitialConnection,
            RelayStatusKind::Deleting,
        ] {
            let s = kind.to_string();
            assert_eq!(s.parse::<RelayStatusKind>().unwrap(), kind);
        }
    }

    #[test]
    fn connection_error_carries_its_reason_but_parses_back_to_the_family() {
        let rendered = RelayStatusKind::ConnectionError.display_with_reason(Some("app exit"));
        assert_eq!(rendered, "connection error: app exit");
        assert_eq!(
            rendered.parse::<RelayStatusKind>().unwrap(),
            RelayStatusKind::ConnectionError
        );
    }

    #[test]
    fn resume_horizon_defaults_to_72_hours_back_when_both_are_zero() {
        let rs = RelayStatus {
            url: "wss://relay.example".into(),
            status: "waiting".into(),
            last_eose: 0,
            last_disco: 0,
            updated_at: 0,
        };
        let now = 1_000_000_000;
        assert_eq!(rs.resume_horizon(now), now - 72 * 3600);
    }

    #[test]
    fn resume_horizon_picks_the_later_of_eose_and_disco() {
        let rs = RelayStatus {
            url: "wss://relay.example".into(),
            status: "connection error: reset".into(),
            last_eose: 100,
            last_disco: 200,
            updated_at: 200,
        };
        assert_eq!(rs.resume_horizon(1_000), 200);
    }
}
