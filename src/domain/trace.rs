// ============================================================
// Layer 3 - Trace Domain Types
// ============================================================
// A trace is the packet sequence captured for one page load.
// Each packet carries a timestamp (seconds since the first
// packet) and a signed size: positive for outgoing packets,
// negative for incoming ones.
//
// On disk a packet is a two-element array `[time, size]`,
// which serde maps onto the tuple struct below.

use serde::{Deserialize, Serialize};

/// One observed packet: `(timestamp, signed_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Packet(pub f64, pub i32);

impl Packet {
    pub fn time(&self) -> f64 {
        self.0
    }

    pub fn size(&self) -> i32 {
        self.1
    }

    /// +1 for outgoing, -1 for incoming, 0 for an empty cell
    pub fn direction(&self) -> f32 {
        self.1.signum() as f32
    }
}

/// A traffic trace as read from a dataset split.
///
/// `site == None` marks an unmonitored sample: traffic from a
/// page outside the set the classifier was trained to recognise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledTrace {
    #[serde(default)]
    pub site: Option<usize>,

    #[serde(default)]
    pub subpage: Option<usize>,

    pub trace: Vec<Packet>,
}

impl LabeledTrace {
    pub fn new(site: Option<usize>, subpage: Option<usize>, trace: Vec<Packet>) -> Self {
        Self { site, subpage, trace }
    }

    pub fn is_unmonitored(&self) -> bool {
        self.site.is_none()
    }

    /// Number of packets in the raw trace
    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_packet_pairs() {
        let json = r#"{"site": 3, "subpage": 31, "trace": [[0.0, 512], [0.25, -1500]]}"#;
        let t: LabeledTrace = serde_json::from_str(json).unwrap();
        assert_eq!(t.site, Some(3));
        assert_eq!(t.subpage, Some(31));
        assert_eq!(t.len(), 2);
        assert_eq!(t.trace[1].size(), -1500);
        assert_eq!(t.trace[1].direction(), -1.0);
    }

    #[test]
    fn test_missing_site_is_unmonitored() {
        let t: LabeledTrace = serde_json::from_str(r#"{"trace": []}"#).unwrap();
        assert!(t.is_unmonitored());
        assert!(t.is_empty());
    }
}
