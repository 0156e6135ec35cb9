//! Consent gating.
//!
//! # Responsibilities
//! - Answer whether a client may be queued or routed yet
//! - Record acceptance
//! - Rate-limit consent prompts per client
//!
//! While consent is outstanding a client is confined to the holding area:
//! the tracker refuses to enqueue it and the reconnector refuses to
//! cascade it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::host::{ClientRef, Notice};
use crate::store::ConsentStore;

const DEFAULT_PROMPT_COOLDOWN: Duration = Duration::from_secs(5);

pub struct ConsentManager {
    store: Arc<dyn ConsentStore>,
    prompt_cooldown: Duration,
    last_prompts: DashMap<Uuid, Instant>,
}

impl ConsentManager {
    pub fn new(store: Arc<dyn ConsentStore>, prompt_cooldown_secs: u64) -> Self {
        let prompt_cooldown = if prompt_cooldown_secs > 0 {
            Duration::from_secs(prompt_cooldown_secs)
        } else {
            DEFAULT_PROMPT_COOLDOWN
        };
        Self {
            store,
            prompt_cooldown,
            last_prompts: DashMap::new(),
        }
    }

    pub async fn has_consent(&self, client: &ClientRef) -> bool {
        self.store.has_consent(client.id()).await
    }

    pub async fn is_consent_required(&self, client: &ClientRef) -> bool {
        !self.has_consent(client).await
    }

    /// Unconditional store write; idempotent.
    pub async fn accept(&self, client: &ClientRef) {
        self.store.set_consent(client.id(), true).await;
    }

    /// Prompt, silently suppressed within the per-client cooldown window.
    pub fn send_prompt(&self, client: &ClientRef) {
        let now = Instant::now();
        if let Some(last) = self.last_prompts.get(&client.id()) {
            if now.duration_since(*last) < self.prompt_cooldown {
                return;
            }
        }
        self.last_prompts.insert(client.id(), now);
        client.send_notice(Notice::ConsentPrompt);
    }
}
