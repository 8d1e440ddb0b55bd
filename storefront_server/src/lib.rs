//! # Storefront server
//! The long-running half of the storefront ledger. It owns no HTTP surface; it opens the database, brings the schema
//! up to date and then runs two background workers until it is interrupted:
//! * The reconciliation worker polls every configured bank feed and credits matching transfers to wallets. The feed
//!   file is re-read whenever it changes on disk.
//! * The expiry worker moves orders that stayed unpaid for too long to `Expired`.
//!
//! Committed changes are published as events and logged by the hooks in [`hooks`].
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod feed_watcher;
pub mod hooks;
pub mod reconciliation_worker;
pub mod server;
