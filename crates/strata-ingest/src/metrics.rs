//! Ingestion metrics.
//!
//! Emitted through the `metrics` facade; the host process decides whether a
//! recorder is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Records decoded successfully.
pub const RECORDS_DECODED: &str = "strata_records_decoded_total";

/// Records dropped by the decoder.
pub const RECORDS_REJECTED: &str = "strata_records_rejected_total";

/// Pipeline outcomes, labelled by `outcome`.
pub const PIPELINE_OUTCOMES: &str = "strata_pipeline_outcomes_total";

/// Pipeline duration histogram.
pub const PIPELINE_DURATION: &str = "strata_pipeline_duration_seconds";

/// Published artifact size histogram.
pub const ARTIFACT_BYTES: &str = "strata_artifact_bytes";

/// Registers all ingestion metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(RECORDS_DECODED, "Total records decoded from trigger payloads");
    describe_counter!(RECORDS_REJECTED, "Total records dropped due to decode failures");
    describe_counter!(PIPELINE_OUTCOMES, "Total pipeline invocations by outcome");
    describe_histogram!(PIPELINE_DURATION, "Duration of pipeline invocations in seconds");
    describe_histogram!(ARTIFACT_BYTES, "Size of published artifacts in bytes");
}

pub(crate) fn record_decoded(decoded: usize, rejected: usize) {
    counter!(RECORDS_DECODED).increment(decoded as u64);
    counter!(RECORDS_REJECTED).increment(rejected as u64);
}

pub(crate) fn record_outcome(outcome: &'static str, duration_secs: f64) {
    counter!(PIPELINE_OUTCOMES, "outcome" => outcome).increment(1);
    histogram!(PIPELINE_DURATION, "outcome" => outcome).record(duration_secs);
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn record_artifact(size_bytes: u64) {
    histogram!(ARTIFACT_BYTES).record(size_bytes as f64);
}
