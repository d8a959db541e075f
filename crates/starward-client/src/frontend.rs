//! Frontend adapters: input edge detection and the drawable list.
//!
//! The window layer polls its keyboard into an
//! [`InputSample`](starward_core::render::InputSample) once per frame;
//! the tracker turns that into `PLAYER_INPUT` messages on change (plus a
//! periodic heartbeat so the server's UDP silence timeout never fires on
//! an idle but healthy client).

use std::time::{Duration, Instant};

use starward_core::components::InputState;
use starward_core::render::{self, InputSample};
use starward_net::message::{self, Message};

/// Resend the current input at least this often.
const HEARTBEAT: Duration = Duration::from_secs(2);

/// Tracks the last sent input and decides when a new `PLAYER_INPUT` is
/// due.
pub struct InputTracker {
    last_sent: Option<InputState>,
    last_sent_at: Instant,
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InputTracker {
    pub fn new() -> Self {
        Self {
            last_sent: None,
            last_sent_at: Instant::now(),
        }
    }

    /// Translate a frame's sample; returns a message when the state
    /// changed or the heartbeat is due. Also returns the local
    /// [`InputState`] for prediction.
    pub fn sample(&mut self, sample: InputSample) -> (InputState, Option<Message>) {
        let state = render::translate_input(sample);
        let due = self.last_sent != Some(state)
            || self.last_sent_at.elapsed() >= HEARTBEAT;
        let message = due.then(|| {
            self.last_sent = Some(state);
            self.last_sent_at = Instant::now();
            Message::PlayerInput(message::PlayerInput {
                up: state.up,
                down: state.down,
                left: state.left,
                right: state.right,
                fire: state.fire,
            })
        });
        (state, message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use starward_core::components::fire;

    #[test]
    fn first_sample_always_sends() {
        let mut tracker = InputTracker::new();
        let (_, msg) = tracker.sample(InputSample::default());
        assert!(msg.is_some());
    }

    #[test]
    fn unchanged_input_is_not_resent() {
        let mut tracker = InputTracker::new();
        let sample = InputSample {
            right: true,
            ..Default::default()
        };
        let (_, first) = tracker.sample(sample);
        assert!(first.is_some());
        let (_, second) = tracker.sample(sample);
        assert!(second.is_none(), "no edge, no send");
    }

    #[test]
    fn edges_trigger_sends() {
        let mut tracker = InputTracker::new();
        tracker.sample(InputSample::default());

        let (state, msg) = tracker.sample(InputSample {
            action1: true,
            ..Default::default()
        });
        assert_eq!(state.fire, fire::NORMAL);
        let Some(Message::PlayerInput(input)) = msg else {
            panic!("expected input message");
        };
        assert_eq!(input.fire, fire::NORMAL);

        let (_, msg) = tracker.sample(InputSample::default());
        assert!(msg.is_some(), "release is an edge too");
    }

    #[test]
    fn heartbeat_fires_after_silence() {
        let mut tracker = InputTracker::new();
        tracker.sample(InputSample::default());
        tracker.last_sent_at = Instant::now() - HEARTBEAT - Duration::from_millis(1);
        let (_, msg) = tracker.sample(InputSample::default());
        assert!(msg.is_some(), "heartbeat keeps the udp channel warm");
    }
}
