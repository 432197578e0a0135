// ============================================================
// Layer 4 - Feature Processor
// ============================================================
// Turns a raw packet sequence into the multi-channel signal the
// classifier consumes. The checkpoint's `feature_list` decides
// which channels are produced and in which order, so the number
// of features is also the model's input channel count.
//
//   trace  [(t0, s0), (t1, s1), ...]
//      │
//      ▼
//   one Vec<f32> per feature, each of trace length
//
// Padding/truncation to the model's fixed input length happens
// later, in the batcher.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::trace::LabeledTrace;

/// Per-packet signals that can be derived from a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Signed packet size
    Sizes,
    /// Packet direction, +1 / -1
    Dirs,
    /// Timestamp
    Times,
    /// Inter-arrival time, 0 for the first packet
    Iats,
    /// Timestamp signed by direction
    TimeDirs,
    /// Direction changes; non-zero where a burst starts
    BurstEdges,
    /// Running sum of signed sizes
    Cumul,
    /// `cumul` scaled into [-1, 1]
    CumulNorm,
    /// Direction-signed ln(1 + 1/iat)
    InvIatLog,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Sizes      => "sizes",
            Feature::Dirs       => "dirs",
            Feature::Times      => "times",
            Feature::Iats       => "iats",
            Feature::TimeDirs   => "time_dirs",
            Feature::BurstEdges => "burst_edges",
            Feature::Cumul      => "cumul",
            Feature::CumulNorm  => "cumul_norm",
            Feature::InvIatLog  => "inv_iat_log",
        };
        f.write_str(name)
    }
}

/// A trace after feature extraction, ready to be batched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    /// `[channels][trace_len]`
    pub features: Vec<Vec<f32>>,
    pub label:    usize,
    /// Packet count of the raw trace
    pub size:     usize,
}

#[derive(Debug, Clone)]
pub struct DataProcessor {
    features: Vec<Feature>,
}

impl DataProcessor {
    pub fn new(features: Vec<Feature>) -> Result<Self> {
        ensure!(!features.is_empty(), "feature_list must name at least one feature");
        Ok(Self { features })
    }

    pub fn input_channels(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn process(&self, sample: &LabeledTrace, label: usize) -> ProcessedSample {
        let features = self
            .features
            .iter()
            .map(|&f| extract(f, sample))
            .collect();
        ProcessedSample { features, label, size: sample.len() }
    }
}

fn extract(feature: Feature, sample: &LabeledTrace) -> Vec<f32> {
    let packets = &sample.trace;
    match feature {
        Feature::Sizes => packets.iter().map(|p| p.size() as f32).collect(),
        Feature::Dirs  => packets.iter().map(|p| p.direction()).collect(),
        Feature::Times => packets.iter().map(|p| p.time() as f32).collect(),
        Feature::Iats  => iats(sample),
        Feature::TimeDirs => packets
            .iter()
            .map(|p| p.time() as f32 * p.direction())
            .collect(),
        Feature::BurstEdges => {
            let mut prev = 0.0;
            packets
                .iter()
                .map(|p| {
                    let d = p.direction();
                    let edge = d - prev;
                    prev = d;
                    edge
                })
                .collect()
        }
        Feature::Cumul => cumul(sample),
        Feature::CumulNorm => {
            let c = cumul(sample);
            let max = c.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            if max == 0.0 {
                c
            } else {
                c.into_iter().map(|v| v / max).collect()
            }
        }
        Feature::InvIatLog => iats(sample)
            .into_iter()
            .zip(packets)
            .map(|(iat, p)| {
                if iat > 0.0 {
                    (1.0 + 1.0 / iat).ln() * p.direction()
                } else {
                    0.0
                }
            })
            .collect(),
    }
}

fn iats(sample: &LabeledTrace) -> Vec<f32> {
    let mut prev = None;
    sample
        .trace
        .iter()
        .map(|p| {
            let iat = prev.map_or(0.0, |t: f64| p.time() - t);
            prev = Some(p.time());
            iat as f32
        })
        .collect()
}

fn cumul(sample: &LabeledTrace) -> Vec<f32> {
    let mut acc = 0.0f32;
    sample
        .trace
        .iter()
        .map(|p| {
            acc += p.size() as f32;
            acc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trace::Packet;

    fn sample() -> LabeledTrace {
        LabeledTrace::new(
            Some(0),
            None,
            vec![Packet(0.0, 100), Packet(0.5, -500), Packet(1.0, -500), Packet(3.0, 200)],
        )
    }

    #[test]
    fn test_channel_count_follows_feature_list() {
        let p = DataProcessor::new(vec![Feature::Dirs, Feature::Iats, Feature::Cumul]).unwrap();
        assert_eq!(p.input_channels(), 3);
        let out = p.process(&sample(), 7);
        assert_eq!(out.features.len(), 3);
        assert!(out.features.iter().all(|ch| ch.len() == 4));
        assert_eq!(out.label, 7);
        assert_eq!(out.size, 4);
    }

    #[test]
    fn test_basic_channels() {
        let s = sample();
        assert_eq!(extract(Feature::Dirs, &s), vec![1.0, -1.0, -1.0, 1.0]);
        assert_eq!(extract(Feature::Iats, &s), vec![0.0, 0.5, 0.5, 2.0]);
        assert_eq!(extract(Feature::Cumul, &s), vec![100.0, -400.0, -900.0, -700.0]);
        assert_eq!(extract(Feature::BurstEdges, &s), vec![1.0, -2.0, 0.0, 2.0]);
        assert_eq!(extract(Feature::TimeDirs, &s), vec![0.0, -0.5, -1.0, 3.0]);
    }

    #[test]
    fn test_cumul_norm_bounded() {
        let c = extract(Feature::CumulNorm, &sample());
        assert!(c.iter().all(|v| v.abs() <= 1.0));
        assert_eq!(c[2], -1.0);
    }

    #[test]
    fn test_inv_iat_log_zero_for_first_packet() {
        let v = extract(Feature::InvIatLog, &sample());
        assert_eq!(v[0], 0.0);
        assert!((v[1] + 3.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_feature_names_round_trip_through_serde() {
        let parsed: Vec<Feature> =
            serde_json::from_str(r#"["inv_iat_log", "burst_edges", "cumul_norm"]"#).unwrap();
        assert_eq!(parsed, vec![Feature::InvIatLog, Feature::BurstEdges, Feature::CumulNorm]);
        assert_eq!(Feature::TimeDirs.to_string(), "time_dirs");
    }

    #[test]
    fn test_empty_feature_list_rejected() {
        assert!(DataProcessor::new(Vec::new()).is_err());
    }
}
