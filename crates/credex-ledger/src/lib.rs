pub mod clock;
pub mod error;
pub mod ledger;

pub use clock::{ManualClock, SystemClock};
pub use error::*;
pub use ledger::InMemoryLedger;
