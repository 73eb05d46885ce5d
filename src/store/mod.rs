//! In-memory keyed store shared by all entity factories

pub mod flags;
pub mod keyed;
pub mod shared;

pub use flags::StoreFlags;
pub use keyed::{Deleted, Empty, KeyedStore, Merge, StoreRef};
pub use shared::{SharedStore, Store, lock};
