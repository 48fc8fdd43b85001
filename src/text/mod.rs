//! Text indexing for read-along playback.
//!
//! * [`index`]: splits page text into [`WordSpan`]s with char offsets.
//! * [`WordIndex`]: owns the text and its spans; resolves synthesizer
//!   offsets back to words.
//! * [`split_sentences`]: sentence chunks for synthesizers that speak
//!   one sentence at a time.
//!
//! All offsets are Unicode scalar (char) offsets into the full page text.

pub mod indexer;
pub mod sentences;

pub use indexer::{index, WordIndex, WordSpan};
pub use sentences::{split_sentences, Sentence};
