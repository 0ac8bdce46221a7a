//! Contains the building blocks a session is assembled from.
//!
//! This module provides the timed side effects that run while the user sleeps
//! (`sleep_event`) and the repeating wake signal that runs once they should
//! be awake (`signal_loop`). The `EventScheduler` and `Alarm` drive them.

pub mod signal_loop;
pub mod sleep_event;
