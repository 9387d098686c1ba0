// Study flows: resumable batches, fixed-size legacy sessions and free practice.
// Planning lives in tracker.rs; the other modules persist what it decides.

pub mod batch;
pub mod config;
pub mod handlers;
pub mod items;
pub mod memory;
pub mod practice;
pub mod session;
pub mod summary;
pub mod tracker;
