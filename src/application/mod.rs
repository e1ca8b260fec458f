// Application layer: the ledger transaction coordinator and the pieces it
// orchestrates (account locks, engine configuration, error taxonomy).

pub mod config;
pub mod error;
pub mod locks;
pub mod service;

pub use config::*;
pub use error::*;
pub use locks::*;
pub use service::*;
