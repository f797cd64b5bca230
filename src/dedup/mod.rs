pub mod first_seen;

pub use first_seen::MessageTracker;
