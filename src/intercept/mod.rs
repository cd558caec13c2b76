//! Request interception: classification, completion and orchestration.

pub mod classify;
pub mod controller;
pub mod request;

pub use classify::{Classification, classify};
pub use controller::{InterceptionController, RequestInterceptor};
pub use request::{ByteRange, Completion, LoadOutcome, LoadingRequest};
