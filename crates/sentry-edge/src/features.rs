//! Feature Extractor (§4.3): a fixed-dimension, ordered numeric
//! vector per `EnrichedEvent`. Grounded on
//! `kitnet_detector.py::extract_features` /
//! `_extract_zeek_flow_features` / `_extract_time_features`.

use std::net::Ipv4Addr;

use crate::correlator::{time_features, EnrichedEvent};

/// The fixed dimension D of the feature vector (§4.3 lists 17 fields).
pub const FEATURE_DIM: usize = 17;

fn ip_to_u32(ip: &str) -> f64 {
    ip.parse::<Ipv4Addr>()
        .map(|addr| u32::from(addr) as f64)
        .unwrap_or(0.0)
}

fn protocol_to_code(protocol: &str) -> f64 {
    match protocol.to_lowercase().as_str() {
        "tcp" => 6.0,
        "udp" => 17.0,
        "icmp" => 1.0,
        _ => 0.0,
    }
}

/// Connection-state code table (Glossary, feature 14).
pub fn conn_state_code(state: &str) -> f64 {
    match state {
        "S0" => 0.1,
        "S1" => 0.2,
        "SF" => 0.3,
        "REJ" => 0.4,
        "S2" => 0.5,
        "S3" => 0.6,
        "RSTO" => 0.7,
        "RSTR" => 0.8,
        "RSTOS0" => 0.9,
        "RSTRH" => 1.0,
        _ => 0.0,
    }
}

/// Extract the ordered 17-field feature vector from an `EnrichedEvent`.
pub fn extract_features(event: &EnrichedEvent) -> Vec<f64> {
    let (hour, weekday, second) = time_features(event.ts);

    vec![
        event.orig_bytes as f64,
        event.resp_bytes as f64,
        event.duration,
        event.src_port as f64,
        event.dest_port as f64,
        ip_to_u32(&event.src_ip),
        ip_to_u32(&event.dest_ip),
        protocol_to_code(&event.protocol),
        event.orig_pkts as f64,
        event.resp_pkts as f64,
        hour,
        weekday,
        second,
        conn_state_code(&event.conn_state),
        (event.service.len() as f64 / 20.0).min(1.0),
        (event.duration / 3600.0).min(1.0),
        (event.total_bytes as f64 / 1.0e6).min(1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::DurationCategory;
    use chrono::Utc;

    fn sample_event() -> EnrichedEvent {
        EnrichedEvent {
            ts: Utc::now(),
            src_ip: "10.0.0.1".to_string(),
            src_port: 5555,
            dest_ip: "45.33.32.156".to_string(),
            dest_port: 443,
            protocol: "tcp".to_string(),
            service: "ssl".to_string(),
            duration: 2.0,
            orig_bytes: 5_000_000,
            resp_bytes: 1_000,
            conn_state: "SF".to_string(),
            history: "ShADadFf".to_string(),
            orig_pkts: 10,
            resp_pkts: 8,
            bytes_ratio: 5000.0,
            pkt_ratio: 1.25,
            total_bytes: 5_001_000,
            duration_category: DurationCategory::Medium,
            flow: Default::default(),
            has_dns: false,
            has_http: false,
            has_ssl: false,
            has_notices: false,
        }
    }

    #[test]
    fn dimension_is_seventeen() {
        assert_eq!(extract_features(&sample_event()).len(), FEATURE_DIM);
    }

    #[test]
    fn non_ipv4_maps_to_zero() {
        let mut e = sample_event();
        e.src_ip = "not-an-ip".to_string();
        let f = extract_features(&e);
        assert_eq!(f[5], 0.0);
    }

    #[test]
    fn protocol_codes_match_table() {
        assert_eq!(protocol_to_code("tcp"), 6.0);
        assert_eq!(protocol_to_code("udp"), 17.0);
        assert_eq!(protocol_to_code("icmp"), 1.0);
        assert_eq!(protocol_to_code("sctp"), 0.0);
    }

    #[test]
    fn conn_state_table_matches_glossary() {
        assert_eq!(conn_state_code("SF"), 0.3);
        assert_eq!(conn_state_code("RSTRH"), 1.0);
        assert_eq!(conn_state_code("UNKNOWN"), 0.0);
    }

    #[test]
    fn all_features_are_finite() {
        let f = extract_features(&sample_event());
        assert!(f.iter().all(|x| x.is_finite()));
    }
}
