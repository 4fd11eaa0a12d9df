//! Session lifetime and orchestration.

pub mod clock;
pub mod principal;
pub mod service;

pub use clock::{ClockEvent, SessionClock};
pub use principal::Principal;
pub use service::SessionService;
