// venue-ledger: per-account order and margin ledger for exchange connectivity.
// the venue matches orders; this crate tracks what the venue told us, exactly.
// all money math is fixed-point and deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Precision, Timestamp
//   2.x  order.rs: orders, execution reports, the two-index order ledger
//   3.x  margin.rs: commission, unrealized pnl, leverage, available margin
//   4.x  position.rs: raw-unit positions and the close-then-open fill algorithm
//   5.x  security.rs: instrument definitions and per-account fixed-point grids
//   6.x  balance.rs: per-asset balances and spot settlement
//   7.x  config.rs: margin currency, precision, tolerances, presets
//   10.x account/: the account aggregate: state machine, settlement, sync, queries
//   11.x events.rs: state transition events for audit
//   12.x api.rs: command/query messages for an owning event loop
//   13.x snapshot.rs: read-locked snapshots for other threads

// core ledger modules
pub mod account;
pub mod balance;
pub mod margin;
pub mod order;
pub mod position;
pub mod security;
pub mod types;

// integration modules
pub mod api;
pub mod config;
pub mod events;
pub mod snapshot;

// re exports for convenience
pub use account::*;
pub use balance::*;
pub use events::*;
pub use margin::*;
pub use order::*;
pub use position::*;
pub use security::*;
pub use types::*;
pub use api::{ApiError, ApiResponse, ErrorCode, LedgerCommand, LedgerQuery};
pub use config::{ConfigError, LedgerConfig};
pub use snapshot::{AccountSnapshot, SharedAccountView};
