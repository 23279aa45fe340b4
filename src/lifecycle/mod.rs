//! Container state tracking: lifecycle operations, the ledgers they update
//! and the monitor that reads them.

pub mod executor;
pub mod ledger;
pub mod monitor;
