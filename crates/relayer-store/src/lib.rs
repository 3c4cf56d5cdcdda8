#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Durable persistence for the relayer: a single embedded SQLite database holding the job
//! state machine (`JobStore`) and per-chain sweep cursors (`ChainStore`).

mod chain_store;
mod db;
mod job_store;
mod schema;

pub use chain_store::ChainStore;
pub use db::Database;
pub use job_store::JobStore;
