// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a
//! no-op, so library crates record unconditionally.

use metrics::{describe_counter, describe_gauge};

/// Register all Zapflow metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("zapflow_instances_created_total", "Instances created");
    describe_counter!(
        "zapflow_instance_rejections_total",
        "Instance creation requests rejected by a limit, by reason"
    );
    describe_counter!(
        "zapflow_messages_total",
        "Messages persisted, by direction"
    );
    describe_counter!(
        "zapflow_webhooks_total",
        "Webhook deliveries, by outcome"
    );
    describe_counter!(
        "zapflow_validation_rejections_total",
        "Requests rejected by input validation, by section"
    );
    describe_gauge!("zapflow_live_instances", "Instances currently held");
    describe_gauge!("zapflow_memory_heap_bytes", "Heap bytes reported by the memory probe");
    describe_gauge!("zapflow_memory_limit_bytes", "Configured heap ceiling in bytes");
}

pub fn record_instance_created() {
    metrics::counter!("zapflow_instances_created_total").increment(1);
}

/// Record a limit rejection (`rate_limit`, `capacity`, `memory`).
pub fn record_instance_rejected(reason: &'static str) {
    metrics::counter!("zapflow_instance_rejections_total", "reason" => reason).increment(1);
}

pub fn record_message(direction: &str) {
    metrics::counter!("zapflow_messages_total", "direction" => direction.to_string())
        .increment(1);
}

/// Record a webhook delivery outcome (`delivered` or `failed`).
pub fn record_webhook(outcome: &'static str) {
    metrics::counter!("zapflow_webhooks_total", "outcome" => outcome).increment(1);
}

/// Record a validation rejection for a request section (`body`, `query`, `params`).
pub fn record_validation_rejection(section: &'static str) {
    metrics::counter!("zapflow_validation_rejections_total", "section" => section).increment(1);
}

pub fn set_live_instances(count: u64) {
    metrics::gauge!("zapflow_live_instances").set(count as f64);
}

pub fn set_memory_heap(bytes: u64) {
    metrics::gauge!("zapflow_memory_heap_bytes").set(bytes as f64);
}

pub fn set_memory_limit(bytes: u64) {
    metrics::gauge!("zapflow_memory_limit_bytes").set(bytes as f64);
}
