//! danmu.event.v1 input schema
//!
//! This module defines the record the engine consumes: one audience message,
//! already normalized, tokenized and sentiment-labeled upstream, anchored to a
//! point on the video's playback timeline.

mod event;
mod reader;

pub use event::*;
pub use reader::*;
