// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Per-route request counters and latency samples, recorded by the router
/// middleware. Read back for the shutdown summary and in tests.
#[derive(Default)]
pub struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency_ns: Mutex<HashMap<String, Vec<u64>>>,
}

impl RequestMetrics {
    pub async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        let mut latency_map = self.latency_ns.lock().await;
        latency_map
            .entry(route.to_string())
            .or_insert_with(Vec::new)
            .push(latency.as_nanos() as u64);
    }

    pub async fn count(&self, route: &str, status: StatusCode) -> u64 {
        self.counts
            .lock()
            .await
            .get(&(route.to_string(), status.as_u16()))
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_requests(&self) -> u64 {
        self.counts.lock().await.values().sum()
    }

    pub async fn p99_latency_ns(&self, route: &str) -> Option<u64> {
        let latency_map = self.latency_ns.lock().await;
        let samples = latency_map.get(route)?;
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64) * 0.99).ceil() as usize;
        Some(sorted[idx.saturating_sub(1).min(sorted.len() - 1)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_by_route_and_status() {
        let metrics = RequestMetrics::default();
        metrics
            .observe_request("/health", StatusCode::OK, Duration::from_millis(1))
            .await;
        metrics
            .observe_request("/health", StatusCode::OK, Duration::from_millis(2))
            .await;
        metrics
            .observe_request("/units", StatusCode::NOT_FOUND, Duration::from_millis(3))
            .await;

        assert_eq!(metrics.count("/health", StatusCode::OK).await, 2);
        assert_eq!(metrics.count("/units", StatusCode::NOT_FOUND).await, 1);
        assert_eq!(metrics.total_requests().await, 3);
    }

    #[tokio::test]
    async fn p99_tracks_worst_sample() {
        let metrics = RequestMetrics::default();
        for ms in [1u64, 2, 3, 50] {
            metrics
                .observe_request("/units", StatusCode::OK, Duration::from_millis(ms))
                .await;
        }
        let p99 = metrics.p99_latency_ns("/units").await.expect("samples");
        assert_eq!(p99, Duration::from_millis(50).as_nanos() as u64);
        assert!(metrics.p99_latency_ns("/other").await.is_none());
    }
}
