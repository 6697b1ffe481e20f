//! Fair spreading of produced units across consumer buffers.

use crate::buffer::Buffer;
use crate::consumer::Consumer;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Outcome of one distribution.
#[derive(Debug)]
pub struct Distribution {
    /// Whether the producing side should keep sending. `false` only when the
    /// spill left the remainder buffer full.
    pub keep_coming: bool,
    /// Consumers whose buffers gained units; each of them is owed a
    /// notification.
    pub affected: Vec<Arc<Consumer>>,
}

/// Spreads `amount` units across `consumers`, spilling any remainder.
///
/// The share order is a fresh uniform shuffle per call so the indivisible
/// extra units land on different consumers over repeated calls. Buffer locks
/// are acquired in the order of the input slice, not the shuffle, giving
/// concurrent distributions a stable lock order; all consumer buffers stay
/// locked until the split is complete, so the distribution is observed
/// atomically.
///
/// Each pass hands every remaining candidate `remaining / n` units plus one
/// extra for the first `remaining % n` shuffle positions; a consumer stays a
/// candidate for the next pass only while it accepted its full share.
pub async fn distribute(
    amount: u64,
    consumers: &[Arc<Consumer>],
    remainder: Option<&Buffer>,
) -> Distribution {
    let mut candidates: Vec<usize> = (0..consumers.len()).collect();
    candidates.shuffle(&mut rand::thread_rng());

    let mut guards = Vec::with_capacity(consumers.len());
    for consumer in consumers {
        guards.push(consumer.buffer().lock().await);
    }

    let mut accepted = vec![0u64; consumers.len()];
    let mut remaining = amount;

    while remaining > 0 && !candidates.is_empty() {
        let per_consumer = remaining / candidates.len() as u64;
        let extra = remaining % candidates.len() as u64;
        let mut next_candidates = Vec::with_capacity(candidates.len());

        for (position, &index) in candidates.iter().enumerate() {
            let share = per_consumer + u64::from((position as u64) < extra);
            let added = consumers[index]
                .buffer()
                .add_locked(&mut guards[index], share);

            accepted[index] += added;
            remaining -= added;

            if added == share {
                next_candidates.push(index);
            }
        }

        candidates = next_candidates;
    }

    drop(guards);

    let affected = consumers
        .iter()
        .enumerate()
        .filter(|(index, _)| accepted[*index] > 0)
        .map(|(_, consumer)| Arc::clone(consumer))
        .collect();

    let keep_coming = if remaining > 0 {
        match remainder {
            Some(buffer) => {
                let mut slot = buffer.lock().await;
                buffer.add_locked(&mut slot, remaining);
                !buffer.is_full_locked(&slot)
            }
            // Nowhere to spill; the consumers are the only sink and more can
            // always be attempted.
            None => true,
        }
    } else {
        // The consumers absorbed everything without touching the remainder.
        true
    };

    Distribution {
        keep_coming,
        affected,
    }
}
