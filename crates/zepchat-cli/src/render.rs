//! Live rendering of a streamed answer.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use zepchat_client::{StreamConsumer, StreamState, Subscription};

/// Tracks how much of the current answer has been written.
#[derive(Debug, Default)]
pub struct Progress {
    printed: usize,
}

impl Progress {
    /// The part of `state.text` not written yet.
    pub fn unseen<'a>(&mut self, state: &'a StreamState) -> &'a str {
        // A shorter text means a new request started.
        if state.text.len() < self.printed {
            self.printed = 0;
        }
        let delta = &state.text[self.printed..];
        self.printed = state.text.len();
        delta
    }
}

/// Print each newly streamed piece of text to `out` as it arrives.
pub fn attach<W>(consumer: &StreamConsumer, out: W) -> Subscription
where
    W: Write + Send + 'static,
{
    let out = Arc::new(Mutex::new(out));
    let progress = Mutex::new(Progress::default());

    consumer.subscribe(move |state| {
        let mut progress = progress.lock();
        let delta = progress.unseen(state);
        if delta.is_empty() {
            return;
        }
        let mut out = out.lock();
        // Write errors are ignored.
        let _ = out.write_all(delta.as_bytes());
        let _ = out.flush();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_returns_only_new_text() {
        let mut progress = Progress::default();
        assert_eq!(progress.unseen(&StreamState::new(true, "")), "");
        assert_eq!(progress.unseen(&StreamState::new(true, "Hel")), "Hel");
        assert_eq!(progress.unseen(&StreamState::new(true, "Hello")), "lo");
        assert_eq!(progress.unseen(&StreamState::new(false, "Hello")), "");
    }

    #[test]
    fn test_unseen_restarts_after_reset() {
        let mut progress = Progress::default();
        progress.unseen(&StreamState::new(false, "previous answer"));
        assert_eq!(progress.unseen(&StreamState::new(true, "")), "");
        assert_eq!(progress.unseen(&StreamState::new(true, "New")), "New");
    }
}
