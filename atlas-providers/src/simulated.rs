//! Offline reply source for demo mode

use std::time::Duration;

use async_trait::async_trait;
use atlas_core::reply::{ReplyResult, ReplySource};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Canned replies served in demo mode
pub const DEMO_REPLIES: &[&str] = &[
    "This is the offline demo of Planet Atlas. The full version forwards your question to a local Llama 3.2 model served by Ollama.",
    "Demo mode is on, so this answer is canned. Start the chat backend and switch to remote mode to get real answers about the world.",
    "Hi! Nothing leaves your machine in demo mode. Conversations are still saved, so you can try creating, switching and deleting chats.",
    "Planet Atlas keeps every conversation in local storage and titles it after your first question.",
    "With the backend running I can answer questions about countries, capitals, rivers, mountains and climate. Right now I only pretend to.",
    "This reply was picked at random after a short pause to imitate a model thinking. Run `planet-atlas serve` for the real thing.",
];

/// Picks a canned reply after a uniformly random delay. Never fails.
pub struct SimulatedReplySource {
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatedReplySource {
    /// Bounds are in milliseconds; swapped bounds are reordered
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        let (lo, hi) = if min_delay_ms <= max_delay_ms {
            (min_delay_ms, max_delay_ms)
        } else {
            (max_delay_ms, min_delay_ms)
        };
        Self {
            min_delay: Duration::from_millis(lo),
            max_delay: Duration::from_millis(hi),
        }
    }

    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (self.min_delay, self.max_delay)
    }
}

impl Default for SimulatedReplySource {
    fn default() -> Self {
        Self::new(1000, 2500)
    }
}

#[async_trait]
impl ReplySource for SimulatedReplySource {
    async fn generate_reply(&self, _text: &str) -> ReplyResult<String> {
        // ThreadRng is !Send; it must be dropped before the await
        let (delay, reply) = {
            let mut rng = rand::thread_rng();
            let millis = rng.gen_range(self.min_delay.as_millis()..=self.max_delay.as_millis());
            let reply = DEMO_REPLIES.choose(&mut rng).copied().unwrap_or_default();
            (Duration::from_millis(millis as u64), reply)
        };

        debug!("Simulated reply in {:?}", delay);
        tokio::time::sleep(delay).await;
        Ok(reply.to_string())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
