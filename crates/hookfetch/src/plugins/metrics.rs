//! Request/response metrics collection
//!
//! Start instants are recorded in `onRequestInit` keyed by [`RequestId`];
//! `onResponse` finds its start time through the response's back-reference
//! to the originating request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::FetchResult;
use crate::plugins::core::{Phase, Plugin, RequestInitContext, ResponseContext};
use crate::request::RequestId;

/// Start times older than this are dropped; their requests never produced a response
const STALE_AFTER: Duration = Duration::from_secs(600);

/// Aggregate request/response metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsData {
    /// Total number of requests started
    pub total_requests: u64,

    /// Responses with a 2xx status
    pub successful_responses: u64,

    /// Responses with any other status
    pub failed_responses: u64,

    /// Average response time in milliseconds
    pub avg_response_time_ms: f64,

    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,

    /// Per HTTP method breakdown
    pub method_metrics: HashMap<String, MethodMetrics>,

    /// Start time for metrics collection
    pub start_time: DateTime<Utc>,

    /// Last reset time
    pub last_reset: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodMetrics {
    pub count: u64,
    pub avg_duration_ms: f64,
    pub success_count: u64,
    pub error_count: u64,
}

impl Default for MetricsData {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            total_requests: 0,
            successful_responses: 0,
            failed_responses: 0,
            avg_response_time_ms: 0.0,
            min_response_time_ms: u64::MAX,
            max_response_time_ms: 0,
            method_metrics: HashMap::new(),
            start_time: now,
            last_reset: now,
        }
    }
}

impl MetricsData {
    fn record(&mut self, method: &str, duration: Duration, is_success: bool) {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        if is_success {
            self.successful_responses += 1;
        } else {
            self.failed_responses += 1;
        }
        self.min_response_time_ms = self.min_response_time_ms.min(duration_ms);
        self.max_response_time_ms = self.max_response_time_ms.max(duration_ms);

        let total = self.successful_responses + self.failed_responses;
        self.avg_response_time_ms =
            running_average(self.avg_response_time_ms, total, duration_ms as f64);

        let entry = self.method_metrics.entry(method.to_string()).or_default();
        entry.count += 1;
        if is_success {
            entry.success_count += 1;
        } else {
            entry.error_count += 1;
        }
        entry.avg_duration_ms = running_average(entry.avg_duration_ms, entry.count, duration_ms as f64);
    }
}

fn running_average(previous: f64, count: u64, sample: f64) -> f64 {
    (previous * (count - 1) as f64 + sample) / count as f64
}

/// Plugin for collecting request/response metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsPlugin {
    metrics: Arc<Mutex<MetricsData>>,
    request_times: Arc<Mutex<HashMap<RequestId, Instant>>>,
}

impl MetricsPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current metrics
    #[must_use]
    pub fn get_metrics(&self) -> MetricsData {
        self.metrics.lock().clone()
    }

    /// Number of requests started but not yet answered
    pub fn in_flight(&self) -> usize {
        self.request_times.lock().len()
    }

    /// Reset all metrics
    pub fn reset(&self) {
        let mut metrics = self.metrics.lock();
        *metrics = MetricsData {
            start_time: metrics.start_time,
            ..MetricsData::default()
        };
        self.request_times.lock().clear();
    }
}

#[async_trait]
impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> Option<&str> {
        Some("Collects request/response metrics and performance data")
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::RequestInit, Phase::Response]
    }

    async fn on_request_init(&self, ctx: &mut RequestInitContext<'_>) -> FetchResult<()> {
        let now = Instant::now();
        {
            let mut times = self.request_times.lock();
            times.retain(|_, started| now.duration_since(*started) < STALE_AFTER);
            times.insert(ctx.request_init.id, now);
        }
        self.metrics.lock().total_requests += 1;

        debug!(request_id = %ctx.request_init.id, "Metrics: recorded request start");
        Ok(())
    }

    async fn on_response(&self, ctx: &mut ResponseContext<'_>) -> FetchResult<()> {
        let Some(origin) = ctx.response.request_init() else {
            return Ok(());
        };
        let Some(started) = self.request_times.lock().remove(&origin.id) else {
            return Ok(());
        };

        let duration = started.elapsed();
        let is_success = ctx.response.is_success();
        let method = origin.method.to_string();
        self.metrics.lock().record(&method, duration, is_success);

        debug!(
            "Metrics: recorded response for {} ({}ms, success: {})",
            method,
            duration.as_millis(),
            is_success
        );
        Ok(())
    }
}
