//! Metrics for group resolution
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the host application.

use crate::filter::ObjectClass;
use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names
pub mod names {
    pub const DIRECTORY_SEARCHES_TOTAL: &str = "adclaims_directory_searches_total";
    pub const DIRECTORY_ERRORS_TOTAL: &str = "adclaims_directory_errors_total";
    pub const AMBIGUOUS_MATCHES_TOTAL: &str = "adclaims_ambiguous_matches_total";
    pub const ROLES_EMITTED_TOTAL: &str = "adclaims_roles_emitted_total";
    pub const RESOLUTIONS_TOTAL: &str = "adclaims_resolutions_total";
    pub const RESOLUTION_DURATION_SECONDS: &str = "adclaims_resolution_duration_seconds";
}

pub fn record_search(object_class: ObjectClass) {
    counter!(names::DIRECTORY_SEARCHES_TOTAL, "object_class" => object_class.as_str()).increment(1);
}

pub fn record_directory_error(object_class: ObjectClass) {
    counter!(names::DIRECTORY_ERRORS_TOTAL, "object_class" => object_class.as_str()).increment(1);
}

pub fn record_ambiguous_match(object_class: ObjectClass) {
    counter!(names::AMBIGUOUS_MATCHES_TOTAL, "object_class" => object_class.as_str()).increment(1);
}

/// Record the outcome of one authentication-time resolution
pub fn record_resolution(outcome: &'static str, roles: usize, elapsed: Duration) {
    counter!(names::RESOLUTIONS_TOTAL, "outcome" => outcome).increment(1);
    counter!(names::ROLES_EMITTED_TOTAL).increment(roles as u64);
    histogram!(names::RESOLUTION_DURATION_SECONDS, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}
