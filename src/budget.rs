//! Output-length budgets per [`LengthClass`].
//!
//! | Class | Chunk window | Beams | Time |
//! |-------|--------------|-------|------|
//! | short | 60-110 | 4 | 15s |
//! | medium | 120-180 | 3 | 20s |
//! | long | 200-260 | 3 | 20s |
//!
//! The reduction pass over concatenated chunk summaries raises the minimum to
//! 120 (except for `short`) and the maximum by 40, capped at 340.

use std::time::Duration;

use crate::models::LengthClass;

pub const HARD_MAX_NEW_TOKENS: usize = 300;
pub const MIN_NEW_TOKENS_FLOOR: usize = 16;
pub const REDUCTION_MIN_TOKENS: usize = 120;
pub const REDUCTION_EXTRA_TOKENS: usize = 40;
pub const REDUCTION_MAX_TOKENS: usize = 340;

/// Decoding parameters for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub no_repeat_ngram_size: usize,
    pub do_sample: bool,
    pub early_stopping: bool,
    pub length_penalty: f32,
    pub max_time: Duration,
}

struct ClassWindow {
    min: usize,
    max: usize,
    beams: usize,
    secs: u64,
}

fn window(class: LengthClass) -> ClassWindow {
    match class {
        LengthClass::Short => ClassWindow { min: 60, max: 110, beams: 4, secs: 15 },
        LengthClass::Medium => ClassWindow { min: 120, max: 180, beams: 3, secs: 20 },
        LengthClass::Long => ClassWindow { min: 200, max: 260, beams: 3, secs: 20 },
    }
}

impl GenerationParams {
    fn bounded(min: usize, max: usize, beams: usize, max_time: Duration) -> Self {
        Self {
            min_new_tokens: min.min(max).max(MIN_NEW_TOKENS_FLOOR),
            max_new_tokens: max,
            num_beams: beams,
            no_repeat_ngram_size: 3,
            do_sample: false,
            early_stopping: true,
            length_penalty: 1.0,
            max_time,
        }
    }

    /// Parameters for summarizing one chunk.
    pub fn for_chunk(class: LengthClass) -> Self {
        let w = window(class);
        let max = w.max.min(HARD_MAX_NEW_TOKENS);
        Self::bounded(w.min, max, w.beams, Duration::from_secs(w.secs))
    }

    /// Parameters for the reduction pass over joined chunk summaries.
    pub fn for_reduction(class: LengthClass) -> Self {
        let w = window(class);
        let min = match class {
            LengthClass::Short => w.min,
            _ => w.min.max(REDUCTION_MIN_TOKENS),
        };
        let max = (w.max + REDUCTION_EXTRA_TOKENS).min(REDUCTION_MAX_TOKENS);
        let secs = match class {
            LengthClass::Short => 15,
            _ => 25,
        };
        Self::bounded(min, max, w.beams, Duration::from_secs(secs))
    }
}
