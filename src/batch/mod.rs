//! Batch translation protocol: merging texts into backend-sized payloads,
//! splitting responses back apart and scheduling the resulting rounds.

pub mod codec;
pub mod gate;
pub mod pacing;
pub mod planner;

pub use codec::{BatchCodec, TagCodec};
pub use gate::{encoded_length, excess_length, Payload};
pub use pacing::RequestPacer;
pub use planner::{BatchPolicy, ChunkPlanner, DEFAULT_CALL_TIMEOUT};

/// Position of one text inside an encoded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Marker id used in the payload.
    pub id: usize,
    /// Index of the text in the caller's original sequence.
    pub source_index: usize,
}

/// A contiguous group of texts merged into one payload.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    payload: String,
    slots: Vec<Slot>,
}

impl EncodedBatch {
    /// Encode `texts`, whose first element sits at `offset` in the original sequence.
    pub fn build(codec: &dyn BatchCodec, texts: &[&str], offset: usize) -> Self {
        let slots = (0..texts.len())
            .map(|id| Slot {
                id,
                source_index: offset + id,
            })
            .collect();
        Self {
            payload: codec.encode(texts),
            slots,
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Payload length in characters.
    pub fn char_len(&self) -> usize {
        self.payload.chars().count()
    }

    /// Write decoded slots back to their original indices.
    ///
    /// Returns how many texts were recovered.
    pub fn scatter(&self, mut decoded: Vec<Option<String>>, results: &mut [Option<String>]) -> usize {
        let mut recovered = 0;
        for slot in &self.slots {
            let value = decoded.get_mut(slot.id).and_then(Option::take);
            if value.is_some() {
                recovered += 1;
            }
            if let Some(target) = results.get_mut(slot.source_index) {
                *target = value;
            }
        }
        recovered
    }
}
