//! Best-server selection over probed candidates

use crate::{
    error::{AppError, Result},
    models::ServerRecord,
};
use std::cmp::Ordering;

/// Picks the measurement server from probed records
///
/// Ordering is lowest latency, then lowest distance, then lowest id. The
/// selector never probes; every record must already carry `latency_ms`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerSelector;

impl ServerSelector {
    pub fn new() -> Self {
        Self
    }

    /// Select the best record
    pub fn select(&self, records: &[ServerRecord]) -> Result<ServerRecord> {
        if records.is_empty() {
            return Err(AppError::no_servers(None));
        }

        let mut best: Option<(&ServerRecord, f64)> = None;
        for record in records {
            let latency = match record.latency_ms {
                Some(latency) if latency.is_finite() && latency >= 0.0 => latency,
                Some(latency) => {
                    return Err(AppError::invalid_measurement(format!(
                        "Server {} has invalid latency {}",
                        record.id, latency
                    )))
                }
                None => {
                    return Err(AppError::invalid_measurement(format!(
                        "Server {} was not probed before selection",
                        record.id
                    )))
                }
            };

            best = match best {
                Some((current, current_latency))
                    if Self::rank(current_latency, current, latency, record) != Ordering::Greater =>
                {
                    Some((current, current_latency))
                }
                _ => Some((record, latency)),
            };
        }

        best.map(|(record, _)| record.clone())
            .ok_or_else(|| AppError::no_servers(None))
    }

    fn rank(a_latency: f64, a: &ServerRecord, b_latency: f64, b: &ServerRecord) -> Ordering {
        a_latency
            .total_cmp(&b_latency)
            .then_with(|| a.distance_km.total_cmp(&b.distance_km))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::sample_server;
    use proptest::prelude::*;

    fn probed(id: u32, distance_km: f64, latency_ms: f64) -> ServerRecord {
        sample_server(id, distance_km).with_latency(latency_ms)
    }

    #[test]
    fn test_lowest_latency_wins() {
        let records = vec![probed(1, 10.0, 30.0), probed(2, 500.0, 12.0), probed(3, 5.0, 18.0)];
        assert_eq!(ServerSelector::new().select(&records).unwrap().id, 2);
    }

    #[test]
    fn test_latency_tie_broken_by_distance() {
        let records = vec![probed(1, 40.0, 12.0), probed(2, 15.0, 12.0), probed(3, 90.0, 12.0)];
        assert_eq!(ServerSelector::new().select(&records).unwrap().id, 2);
    }

    #[test]
    fn test_full_tie_broken_by_id() {
        let records = vec![probed(7, 15.0, 12.0), probed(3, 15.0, 12.0), probed(5, 15.0, 12.0)];
        assert_eq!(ServerSelector::new().select(&records).unwrap().id, 3);
    }

    #[test]
    fn test_empty_input() {
        let error = ServerSelector::new().select(&[]).unwrap_err();
        assert!(matches!(error, AppError::NoServersAvailable { .. }));
    }

    #[test]
    fn test_unprobed_record_rejected() {
        let records = vec![probed(1, 10.0, 30.0), sample_server(2, 5.0)];
        let error = ServerSelector::new().select(&records).unwrap_err();
        assert!(matches!(error, AppError::InvalidMeasurement(_)));
    }

    #[test]
    fn test_nan_latency_rejected() {
        let records = vec![probed(1, 10.0, f64::NAN)];
        assert!(matches!(
            ServerSelector::new().select(&records),
            Err(AppError::InvalidMeasurement(_))
        ));
    }

    fn arb_records() -> impl Strategy<Value = Vec<ServerRecord>> {
        prop::collection::vec((1u32..50, 0u32..5, 0u32..5), 1..20).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(id, distance, latency)| probed(id, distance as f64 * 10.0, latency as f64))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_select_is_deterministic_and_idempotent(records in arb_records()) {
            let selector = ServerSelector::new();
            let first = selector.select(&records).unwrap();
            let second = selector.select(&records).unwrap();
            prop_assert_eq!(&first, &second);

            // Selecting again from the winner alone yields the winner
            let again = selector.select(std::slice::from_ref(&first)).unwrap();
            prop_assert_eq!(&first, &again);
        }

        #[test]
        fn prop_select_is_order_independent(records in arb_records()) {
            let selector = ServerSelector::new();
            let forward = selector.select(&records).unwrap();
            let mut reversed = records.clone();
            reversed.reverse();
            let backward = selector.select(&reversed).unwrap();
            prop_assert_eq!(forward.id, backward.id);
            prop_assert_eq!(forward.latency_ms, backward.latency_ms);
            prop_assert_eq!(forward.distance_km, backward.distance_km);
        }

        #[test]
        fn prop_winner_is_minimal(records in arb_records()) {
            let winner = ServerSelector::new().select(&records).unwrap();
            let best_latency = records
                .iter()
                .filter_map(|r| r.latency_ms)
                .fold(f64::INFINITY, f64::min);
            prop_assert_eq!(winner.latency_ms, Some(best_latency));
        }
    }
}
