// # Run State
//
// The only state crossing directive boundaries within a run.

pub mod write_tracker;

pub use write_tracker::WriteTracker;
