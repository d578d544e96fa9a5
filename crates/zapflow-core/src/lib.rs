// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Zapflow WhatsApp automation platform.
//!
//! Provides the error type, the domain model (instances, messages, accounts)
//! and the adapter traits implemented by storage backends and session drivers.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ZapflowError;
pub use traits::{Adapter, SessionDriver, StorageAdapter};
pub use types::{
    AckState, HealthStatus, Instance, InstanceFilter, InstanceStatus, Message, MessageDirection,
    MessageFilter, OutboundMessage, Page, Role, User, WebhookConfig, WebhookEvent,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render_messages() {
        let not_found = ZapflowError::instance_not_found("abc");
        assert_eq!(not_found.to_string(), "instance not found: abc");

        let transition = ZapflowError::InvalidTransition {
            from: InstanceStatus::Connected.to_string(),
            to: InstanceStatus::Connecting.to_string(),
        };
        assert_eq!(
            transition.to_string(),
            "invalid status transition from connected to connecting"
        );

        let timeout = ZapflowError::Timeout {
            duration: std::time::Duration::from_secs(5),
        };
        assert!(timeout.to_string().contains("5s"));
    }

    #[test]
    fn health_status_availability() {
        assert!(HealthStatus::Healthy.is_available());
        assert!(HealthStatus::Degraded("slow".into()).is_available());
        assert!(!HealthStatus::Unhealthy("down".into()).is_available());
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _assert_storage(_: &dyn StorageAdapter) {}
        fn _assert_driver(_: &dyn SessionDriver) {}
    }
}
