//! `KeyPool` owns an ordered collection of up to 10 [`KeySlot`]s and picks a
//! healthy one per request.

use crate::config::Credential;
use crate::error::TraError;
use crate::slot::{KeySlot, RateLimiterParams, SlotMetrics, SlotState};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_SLOTS: usize = 10;
const TOKENS_PER_SLOT_MAX: usize = 5;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolCapacity {
    pub available: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotMetricsReport {
    pub id: String,
    pub label: Option<String>,
    pub state: SlotState,
    pub metrics: SlotMetrics,
}

/// Exclusive owner of a process's `KeySlot`s. Selection is a single
/// pool-wide mutex around an O(#slots) scan: acceptable since the pool
/// holds at most [`MAX_SLOTS`].
pub struct KeyPool {
    slots: Vec<Arc<KeySlot>>,
    // Round-trip tiebreak state: index into `slots` of the slot chosen least
    // recently, used to break ties on available-token count.
    last_used_order: Mutex<Vec<usize>>,
}

impl KeyPool {
    pub fn new(credentials: Vec<Credential>, http_client: reqwest::Client) -> Self {
        Self::with_rate_limiter_params(credentials, http_client, RateLimiterParams::default())
    }

    /// Same as [`Self::new`], but with the token-bucket knobs overridden for
    /// every slot (spec §9 Open Question 2, `~/.config/tra/config.json`'s
    /// `rate_limiter_max_tokens` / `rate_limiter_refill_rate_per_sec`).
    pub fn with_rate_limiter_params(
        credentials: Vec<Credential>,
        http_client: reqwest::Client,
        rate_limiter_params: RateLimiterParams,
    ) -> Self {
        let slots: Vec<Arc<KeySlot>> = credentials
            .into_iter()
            .take(MAX_SLOTS)
            .map(|c| Arc::new(KeySlot::new(c, http_client.clone(), rate_limiter_params)))
            .collect();
        let last_used_order = Mutex::new((0..slots.len()).collect());
        Self {
            slots,
            last_used_order,
        }
    }

    /// Selects the available slot with the most tokens remaining, ties
    /// broken by least-recently-used. Balances load under sustained
    /// traffic while preferring a freshly refilled slot under burst.
    pub fn get_slot(&self) -> Result<Arc<KeySlot>, TraError> {
        let mut order = self.last_used_order.lock().unwrap_or_else(|e| e.into_inner());

        let mut best: Option<(usize, usize, usize)> = None; // (tiebreak_rank, tokens, slot_index)
        for (rank, &idx) in order.iter().enumerate() {
            let slot = &self.slots[idx];
            if !slot.is_available() {
                continue;
            }
            let tokens = slot.available_tokens();
            let better = match best {
                None => true,
                Some((_, best_tokens, _)) => tokens > best_tokens,
            };
            if better {
                best = Some((rank, tokens, idx));
            }
        }

        let (_, _, chosen_idx) = best.ok_or(TraError::NoAvailableSlots)?;

        // Move the chosen slot to the back of the LRU order.
        if let Some(pos) = order.iter().position(|&i| i == chosen_idx) {
            let idx = order.remove(pos);
            order.push(idx);
        }

        Ok(Arc::clone(&self.slots[chosen_idx]))
    }

    pub fn get_slot_by_id(&self, id: &str) -> Option<Arc<KeySlot>> {
        self.slots.iter().find(|s| s.id == id).cloned()
    }

    pub fn get_active_slot_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state(), SlotState::Active))
            .count()
    }

    /// `available` sums tokens across ACTIVE/COOLDOWN slots; `max` is
    /// `5 * active_slot_count`.
    pub fn get_capacity(&self) -> PoolCapacity {
        let available: usize = self
            .slots
            .iter()
            .filter(|s| !matches!(s.state(), SlotState::Disabled))
            .map(|s| s.available_tokens())
            .sum();
        let max = TOKENS_PER_SLOT_MAX * self.get_active_slot_count();
        PoolCapacity { available, max }
    }

    pub fn get_metrics(&self) -> Vec<SlotMetricsReport> {
        self.slots
            .iter()
            .map(|s| SlotMetricsReport {
                id: s.id.clone(),
                label: s.label.clone(),
                state: s.state(),
                metrics: s.metrics(),
            })
            .collect()
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.rate_limiter.reset();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
