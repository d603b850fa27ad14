use tracing::info;
use uppe_core::processor::{NotificationEvent, NotificationSink};

/// Reports notifications through the log; delivery commands are run elsewhere
#[derive(Debug, Default)]
pub struct LogSink {
    pub dispatched: u64,
}

impl NotificationSink for LogSink {
    fn dispatch(&mut self, event: NotificationEvent) {
        self.dispatched += 1;
        info!(
            kind = %event.kind,
            number = event.number,
            escalated = event.escalated,
            contacts = %event.contacts.join(","),
            "NOTIFICATION: {};{};{}",
            event.object,
            event.state,
            event.output
        );
    }
}

#[cfg(test)]
mod tests {
    use uppe_core::evaluator::NotificationKind;

    use super::*;

    #[test]
    fn test_dispatch_counts_events() {
        let mut sink = LogSink::default();
        sink.dispatch(NotificationEvent {
            object: "web01;HTTP".into(),
            kind: NotificationKind::Problem,
            number: 1,
            state: "CRITICAL".into(),
            output: "connection refused".into(),
            contacts: vec!["oncall".into()],
            escalated: false,
        });
        assert_eq!(sink.dispatched, 1);
    }
}
