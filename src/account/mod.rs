// 10.0 account/: the account aggregate.
// split into multiple files for readability:
// - core.rs: Account struct, constructor, time, events
// - orders.rs: order state machine (pending -> confirm/reject)
// - settlement.rs: fill settlement into positions, margin and balances
// - sync.rs: reconciliation against venue snapshots
// - queries.rs: read-only projections (positions, margin, leverage)
// - results.rs: RejectReason and LedgerError

mod core;
mod orders;
mod queries;
mod results;
mod settlement;
mod sync;

pub use self::core::Account;
pub use queries::PositionView;
pub use results::{LedgerError, RejectReason};
pub use sync::{VenueBalance, VenuePosition};
