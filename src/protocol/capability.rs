//! Capability negotiation: the space-separated tokens a server advertises
//! after its first ref/service line, and that a client echoes back (a
//! subset of them) on its first request line.

use std::fmt;
use std::str::FromStr;

/// A single Git protocol capability, parsed from or rendered into the
/// capability-list portion of a ref advertisement or command request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    SideBand,
    SideBand64k,
    ReportStatus,
    ReportStatusv2,
    OfsDelta,
    ThinPack,
    NoThin,
    DeleteRefs,
    Atomic,
    Quiet,
    Agent(String),
    ObjectFormat(String),
    Symref(String),
    /// Any capability token this client doesn't model explicitly, kept
    /// verbatim so it can still be echoed back or inspected.
    Unknown(String),
}

impl FromStr for Capability {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("agent=") {
            return Ok(Capability::Agent(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("object-format=") {
            return Ok(Capability::ObjectFormat(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("symref=") {
            return Ok(Capability::Symref(rest.to_string()));
        }
        Ok(match s {
            "side-band" => Capability::SideBand,
            "side-band-64k" => Capability::SideBand64k,
            "report-status" => Capability::ReportStatus,
            "report-status-v2" => Capability::ReportStatusv2,
            "ofs-delta" => Capability::OfsDelta,
            "thin-pack" => Capability::ThinPack,
            "no-thin" => Capability::NoThin,
            "delete-refs" => Capability::DeleteRefs,
            "atomic" => Capability::Atomic,
            "quiet" => Capability::Quiet,
            other => Capability::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::SideBand => write!(f, "side-band"),
            Capability::SideBand64k => write!(f, "side-band-64k"),
            Capability::ReportStatus => write!(f, "report-status"),
            Capability::ReportStatusv2 => write!(f, "report-status-v2"),
            Capability::OfsDelta => write!(f, "ofs-delta"),
            Capability::ThinPack => write!(f, "thin-pack"),
            Capability::NoThin => write!(f, "no-thin"),
            Capability::DeleteRefs => write!(f, "delete-refs"),
            Capability::Atomic => write!(f, "atomic"),
            Capability::Quiet => write!(f, "quiet"),
            Capability::Agent(v) => write!(f, "agent={v}"),
            Capability::ObjectFormat(v) => write!(f, "object-format={v}"),
            Capability::Symref(v) => write!(f, "symref={v}"),
            Capability::Unknown(v) => write!(f, "{v}"),
        }
    }
}

/// Parses a space-separated capability list, as found after the NUL byte
/// in a v1 ref advertisement or as a `server-option`/`fetch`-command line.
pub fn parse_capability_list(s: &str) -> Vec<Capability> {
    s.split_ascii_whitespace()
        .filter(|tok| !tok.is_empty())
        .map(|tok| Capability::from_str(tok).unwrap())
        .collect()
}

/// The capabilities this client sends when opening a `fetch` request.
pub fn client_fetch_capabilities(agent: &str) -> Vec<Capability> {
    vec![
        Capability::SideBand64k,
        Capability::OfsDelta,
        Capability::Agent(agent.to_string()),
    ]
}

/// The capabilities this client sends when opening a `git-receive-pack`
/// (`push`) request.
pub fn client_push_capabilities(agent: &str) -> Vec<Capability> {
    vec![
        Capability::ReportStatusv2,
        Capability::SideBand64k,
        Capability::Agent(agent.to_string()),
    ]
}

/// The side-band channel byte a pkt-line payload is tagged with when
/// `side-band`/`side-band-64k` is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBand {
    PackfileData,
    ProgressInfo,
    Error,
}

impl SideBand {
    pub fn value(&self) -> u8 {
        match self {
            Self::PackfileData => 1,
            Self::ProgressInfo => 2,
            Self::Error => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_mixed_capability_list() {
        let caps = parse_capability_list("side-band-64k ofs-delta agent=git-smart-core/0.1.0");
        assert_eq!(
            caps,
            vec![
                Capability::SideBand64k,
                Capability::OfsDelta,
                Capability::Agent("git-smart-core/0.1.0".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_tokens_round_trip_through_display() {
        let caps = parse_capability_list("multi_ack_detailed");
        assert_eq!(caps[0].to_string(), "multi_ack_detailed");
    }

    #[test]
    fn side_band_channel_values_match_the_protocol() {
        assert_eq!(SideBand::PackfileData.value(), 1);
        assert_eq!(SideBand::ProgressInfo.value(), 2);
        assert_eq!(SideBand::Error.value(), 3);
    }
}
