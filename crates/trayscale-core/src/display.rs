// ── Peer naming and presentation ──
//
// Pure functions turning daemon names into the labels shown on page
// titles, tray entries and notifications.

use strum::Display;

use crate::model::PeerInfo;

/// Names longer than this are truncated.
pub const MAX_NAME_CHARS: usize = 30;

const TRUNCATED_CHARS: usize = MAX_NAME_CHARS - 3;

/// Icon shown next to a peer's page entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PeerIcon {
    /// The exit node in use.
    #[strum(serialize = "network-workgroup")]
    Workgroup,
    /// A peer that offers to be an exit node.
    #[strum(serialize = "network-server")]
    Server,
    #[strum(serialize = "folder-remote")]
    RemoteFolder,
}

impl PeerIcon {
    pub fn for_peer(peer: &PeerInfo) -> Self {
        if peer.is_exit_node {
            Self::Workgroup
        } else if peer.offers_exit_node {
            Self::Server
        } else {
            Self::RemoteFolder
        }
    }
}

/// Strip a trailing dot, then a trailing `.<suffix>`.
pub fn trim_suffix<'a>(name: &'a str, suffix: &str) -> &'a str {
    let name = name.strip_suffix('.').unwrap_or(name);
    let suffix = suffix.trim_matches('.');
    if suffix.is_empty() {
        return name;
    }
    name.strip_suffix(suffix)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(name)
}

/// Lowercase, collapse anything outside `[a-z0-9-]` to `-`, trim dashes.
fn sanitize_hostname(host: &str) -> String {
    let mapped: String = host
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_owned()
}

/// The untruncated name for a peer.
///
/// Punycode labels get their Unicode form appended; nodes without a DNS
/// name fall back to their quoted hostname.
pub fn base_name(dns_name: &str, magic_dns_suffix: &str, host_name: &str) -> String {
    let base = trim_suffix(dns_name, magic_dns_suffix);
    if base.is_empty() {
        return format!("({:?})", sanitize_hostname(host_name));
    }
    if base.starts_with("xn-") {
        let (unicode, result) = idna::domain_to_unicode(base);
        if result.is_ok() && unicode != base {
            return format!("{base} ({unicode})");
        }
    }
    base.to_owned()
}

/// Cut names over [`MAX_NAME_CHARS`] to 27 characters plus `...`.
pub fn truncate(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_owned();
    }
    let mut out: String = name.chars().take(TRUNCATED_CHARS).collect();
    out.push_str("...");
    out
}

pub fn display_name(dns_name: &str, magic_dns_suffix: &str, host_name: &str) -> String {
    truncate(&base_name(dns_name, magic_dns_suffix, host_name))
}

/// Page title: display name plus the first applicable role suffix.
pub fn page_title(peer: &PeerInfo) -> String {
    let suffix = if peer.is_self {
        " [This machine]"
    } else if peer.is_exit_node {
        " [Exit node]"
    } else if peer.offers_exit_node {
        " [Exit node option]"
    } else {
        ""
    };
    format!("{}{suffix}", peer.display_name)
}

/// Tray label for the local machine, e.g. `alpha (100.64.0.1)`.
pub fn machine_label(peer: &PeerInfo) -> String {
    match peer.primary_addr() {
        Some(addr) => format!("{} ({addr})", peer.display_name),
        None => peer.display_name.clone(),
    }
}
