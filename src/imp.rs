// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Driver implementations shipped with the crate.
//!
//! Native backends live downstream; the one here records every call so the
//! mirror's decisions can be inspected without a GPU.

mod recording;

pub use recording::{Call, CallLog, RecordingDriver};
