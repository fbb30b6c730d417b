//! Counter name parsing.
//!
//! Xray names per-user counters `user>>>{email}>>>traffic>>>{uplink|downlink}`.
//! The stats service also reports inbound/outbound families; those are skipped.

use std::collections::HashMap;

use meter_proto::CounterRecord;
use tracing::trace;

/// Separator between the four segments of a counter name.
pub const NAME_DELIMITER: &str = ">>>";

const SCOPE_USER: &str = "user";
const CATEGORY_TRAFFIC: &str = "traffic";

/// Traffic direction as seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Uplink,
    Downlink,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uplink => "uplink",
            Self::Downlink => "downlink",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "uplink" => Some(Self::Uplink),
            "downlink" => Some(Self::Downlink),
            _ => None,
        }
    }
}

/// Absolute counters for one identity in one poll.
///
/// A direction missing from the batch is `None`; the aggregator treats it as
/// unchanged for known identities and as zero for new ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityCounters {
    pub uplink: Option<u64>,
    pub downlink: Option<u64>,
}

impl IdentityCounters {
    pub fn new(uplink: u64, downlink: u64) -> Self {
        Self {
            uplink: Some(uplink),
            downlink: Some(downlink),
        }
    }

    fn set(&mut self, direction: Direction, value: u64) {
        match direction {
            Direction::Uplink => self.uplink = Some(value),
            Direction::Downlink => self.downlink = Some(value),
        }
    }
}

/// Counters of one poll, keyed by identity.
pub type Snapshot = HashMap<String, IdentityCounters>;

/// A recognised per-user traffic counter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterName<'a> {
    pub identity: &'a str,
    pub direction: Direction,
}

/// Parse `user>>>{identity}>>>traffic>>>{direction}`.
///
/// Returns `None` for any other counter family, a wrong segment count, an unknown
/// direction or an empty identity.
pub fn parse_name(name: &str) -> Option<CounterName<'_>> {
    let mut parts = name.split(NAME_DELIMITER);
    let (Some(scope), Some(identity), Some(category), Some(direction), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };

    if scope != SCOPE_USER || category != CATEGORY_TRAFFIC || identity.is_empty() {
        return None;
    }

    Some(CounterName {
        identity,
        direction: Direction::parse(direction)?,
    })
}

/// Fold decoded records into per-identity counters.
///
/// When the same counter appears twice in a batch the later record wins.
pub fn parse_counters(records: &[CounterRecord]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for record in records {
        match parse_name(&record.name) {
            Some(CounterName {
                identity,
                direction,
            }) => {
                snapshot
                    .entry(identity.to_string())
                    .or_default()
                    .set(direction, record.value);
            }
            None => trace!(name = %record.name, "skipping counter"),
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: u64) -> CounterRecord {
        CounterRecord {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn parse_user_traffic_names() {
        assert_eq!(
            parse_name("user>>>alice@example.com>>>traffic>>>uplink"),
            Some(CounterName {
                identity: "alice@example.com",
                direction: Direction::Uplink,
            })
        );
        assert_eq!(
            parse_name("user>>>bob>>>traffic>>>downlink"),
            Some(CounterName {
                identity: "bob",
                direction: Direction::Downlink,
            })
        );
    }

    #[test]
    fn reject_other_families() {
        assert_eq!(parse_name("inbound>>>api>>>traffic>>>uplink"), None);
        assert_eq!(parse_name("outbound>>>direct>>>traffic>>>downlink"), None);
        assert_eq!(parse_name("user>>>alice>>>online>>>uplink"), None);
        assert_eq!(parse_name("user>>>alice>>>traffic>>>sideways"), None);
    }

    #[test]
    fn reject_wrong_segment_count() {
        assert_eq!(parse_name("user>>>alice>>>traffic"), None);
        assert_eq!(parse_name("user>>>alice>>>traffic>>>uplink>>>extra"), None);
        assert_eq!(parse_name(""), None);
        assert_eq!(parse_name("user>>>>>>traffic>>>uplink"), None);
    }

    #[test]
    fn single_char_separators_are_not_delimiters() {
        assert_eq!(
            parse_name("user>>>a>b>>>traffic>>>uplink").map(|n| n.identity),
            Some("a>b")
        );
    }

    #[test]
    fn fold_both_directions() {
        let snapshot = parse_counters(&[
            record("user>>>alice>>>traffic>>>uplink", 1000),
            record("user>>>alice>>>traffic>>>downlink", 2000),
            record("user>>>bob>>>traffic>>>downlink", 5),
            record("inbound>>>api>>>traffic>>>uplink", 99),
        ]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["alice"], IdentityCounters::new(1000, 2000));
        assert_eq!(
            snapshot["bob"],
            IdentityCounters {
                uplink: None,
                downlink: Some(5),
            }
        );
    }

    #[test]
    fn later_record_wins() {
        let snapshot = parse_counters(&[
            record("user>>>alice>>>traffic>>>uplink", 1),
            record("user>>>alice>>>traffic>>>uplink", 2),
        ]);
        assert_eq!(snapshot["alice"].uplink, Some(2));
    }

    #[test]
    fn empty_input() {
        assert!(parse_counters(&[]).is_empty());
    }
}
