mod account;
mod entry;
mod money;
mod reconcile;

pub use account::*;
pub use entry::*;
pub use money::*;
pub use reconcile::*;
