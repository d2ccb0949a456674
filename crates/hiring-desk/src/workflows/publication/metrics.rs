//! Publication metrics. Recorded through the `metrics` facade; the API binary
//! installs the Prometheus recorder that exports them.

use metrics::{counter, describe_counter, describe_histogram, histogram};

use super::domain::PublishingRun;

pub const PUBLISH_ATTEMPTS: &str = "hiring_publish_attempts_total";
pub const CHANNEL_OUTCOMES: &str = "hiring_channel_outcomes_total";
pub const CHANNEL_DURATION: &str = "hiring_channel_duration_seconds";

/// Registers metric descriptions. Call once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        PUBLISH_ATTEMPTS,
        "Publish and retry attempts by result (published, retried, rejected, failed)"
    );
    describe_counter!(
        CHANNEL_OUTCOMES,
        "Channel deliveries by channel, kind, and success"
    );
    describe_histogram!(
        CHANNEL_DURATION,
        "Wall-clock duration of a single channel call in seconds"
    );
}

pub fn record_publish_attempt(result: &'static str) {
    counter!(PUBLISH_ATTEMPTS, "result" => result).increment(1);
}

pub fn record_run(run: &PublishingRun) {
    for outcome in &run.outcomes {
        let result = if outcome.success { "success" } else { "failure" };
        counter!(
            CHANNEL_OUTCOMES,
            "channel" => outcome.channel.clone(),
            "kind" => outcome.kind.as_str(),
            "result" => result
        )
        .increment(1);
        histogram!(CHANNEL_DURATION, "channel" => outcome.channel.clone())
            .record(outcome.duration_ms as f64 / 1_000.0);
    }
}
