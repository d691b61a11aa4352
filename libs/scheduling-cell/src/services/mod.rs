pub mod booking;
pub mod ledger;
pub mod lifecycle;

pub use booking::SchedulingService;
pub use ledger::{LedgerError, SlotLedger};
pub use lifecycle::AppointmentStateMachine;
