//! Completion tokens

use std::fmt::Display;

use serde_json::Value;
use tracing::warn;

use super::coordinator::Delay;

/// One outstanding result slot of a [`Delay`]
///
/// Completing consumes the token, so a slot can only be filled once. A token
/// that is dropped without completing leaves its delay pending forever.
#[must_use = "a delay never settles until every token is completed"]
pub struct Token {
    id: usize,
    discard_first: bool,
    delay: Option<Delay>,
}

impl Token {
    pub(crate) fn new(id: usize, discard_first: bool, delay: Delay) -> Self {
        Self {
            id,
            discard_first,
            delay: Some(delay),
        }
    }

    /// Slot id within the current cycle; results are ordered by it
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the first delivered value is dropped as an error slot
    pub fn discards_first(&self) -> bool {
        self.discard_first
    }

    /// Deliver this slot's arguments to the delay
    pub fn complete(mut self, mut args: Vec<Value>) {
        if self.discard_first && !args.is_empty() {
            args.remove(0);
        }
        if let Some(delay) = self.delay.take() {
            delay.deliver(self.id, args);
        }
    }

    /// Complete with the conventional `[error-or-null, ...values]` layout
    ///
    /// With the default discard policy the error slot is dropped, so an `Err`
    /// completes the slot with no values.
    pub fn settle<E: Display>(self, result: Result<Vec<Value>, E>) {
        let args = match result {
            Ok(values) => std::iter::once(Value::Null).chain(values).collect(),
            Err(e) => vec![Value::String(e.to_string())],
        };
        self.complete(args);
    }

    /// Turn the token into a plain callback for producers that take one
    pub fn into_callback(self) -> Box<dyn FnOnce(Vec<Value>)> {
        Box::new(move |args| self.complete(args))
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        if let Some(delay) = &self.delay
            && !delay.is_settled()
        {
            warn!(
                delay_id = %delay.id(),
                token_id = self.id,
                "Token dropped without completing; delay will never settle"
            );
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("discard_first", &self.discard_first)
            .field("completed", &self.delay.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::step;
    use crate::reactor::Reactor;
    use crate::reactor::manual::ManualLoop;
    use eyre::eyre;
    use std::io;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Warnings logged while `f` runs
    fn warnings_during(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn manual() -> (Rc<ManualLoop>, Delay) {
        let reactor = Rc::new(ManualLoop::new());
        let delay = Delay::with_loop(Rc::clone(&reactor) as Rc<dyn Reactor>);
        (reactor, delay)
    }

    #[test]
    fn test_dropping_live_token_warns() {
        let (_reactor, delay) = manual();
        let logs = warnings_during(|| drop(delay.begin()));
        assert!(logs.contains("never settle"), "logs: {logs}");
    }

    #[test]
    fn test_dropping_stray_token_after_finish_is_quiet() {
        let (_reactor, delay) = manual();
        delay.begin().complete(vec![]);
        assert!(delay.is_settled());

        let logs = warnings_during(|| drop(delay.begin()));
        assert!(!logs.contains("never settle"), "logs: {logs}");
    }

    #[test]
    fn test_dropping_token_after_failure_is_quiet() {
        let (reactor, delay) = manual();
        delay.steps([step(|_, _| Err(eyre!("boom")))]);
        reactor.run_pending();
        assert!(delay.is_failed());

        let logs = warnings_during(|| drop(delay.begin()));
        assert!(!logs.contains("never settle"), "logs: {logs}");
    }

    #[test]
    fn test_completed_token_is_not_reported() {
        let (_reactor, delay) = manual();
        let first = delay.begin();
        let _second = delay.begin();
        let logs = warnings_during(|| first.complete(vec![]));
        assert!(logs.is_empty(), "logs: {logs}");
    }
}
