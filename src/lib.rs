//! tickit-webdav - Task and list manager with WebDAV snapshot sync
//!
//! Tasks, lists and settings are kept in a local SQLite record store and
//! mirrored in memory. Synchronization exchanges the whole dataset as a
//! single JSON document on a WebDAV server; an existing remote document
//! always wins over local data.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod state;
pub mod store;
pub mod sync;
pub mod webdav;

pub use db::Database;
pub use error::{Error, Result};
pub use state::AppState;
pub use store::App;
pub use sync::{SyncReport, SyncSource, Synchronizer};
pub use webdav::{RemoteTransport, WebDavClient};
