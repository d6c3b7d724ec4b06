use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("convocode.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("convocode.client.request_errors");
pub(crate) static CLIENT_CONNECT_DURATION: Moments =
    Moments::new("convocode.client.connect_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("convocode.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("convocode.stream.errors");

pub(crate) static TURNS_STARTED: Counter = Counter::new("convocode.turn.started");
pub(crate) static TURNS_COMPLETED: Counter = Counter::new("convocode.turn.completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("convocode.turn.failed");
pub(crate) static TURNS_CANCELED: Counter = Counter::new("convocode.turn.canceled");
pub(crate) static TURN_FRAGMENTS: Counter = Counter::new("convocode.turn.fragments");
pub(crate) static TURN_KEEP_ALIVES: Counter = Counter::new("convocode.turn.keep_alives");
pub(crate) static TURN_FIRST_FRAGMENT: Moments =
    Moments::new("convocode.turn.first_fragment_seconds");
pub(crate) static TURN_DURATION: Moments = Moments::new("convocode.turn.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_CONNECT_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);

    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&TURNS_CANCELED);
    collector.register_counter(&TURN_FRAGMENTS);
    collector.register_counter(&TURN_KEEP_ALIVES);
    collector.register_moments(&TURN_FIRST_FRAGMENT);
    collector.register_moments(&TURN_DURATION);
}

#[cfg(test)]
mod tests {
    use biometrics::Sensor;

    use super::*;

    #[test]
    fn registers_with_a_collector() {
        let collector = Collector::new();
        register_biometrics(collector);
        TURNS_STARTED.click();
        assert!(TURNS_STARTED.read() >= 1);
    }
}
