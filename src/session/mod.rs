pub mod manager;

pub use manager::{PlaybackSession, SessionManager};
