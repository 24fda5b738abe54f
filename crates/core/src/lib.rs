// crates/core/src/lib.rs
pub mod events;
pub mod intent;
pub mod result;
pub mod store;
pub mod summary;

pub use events::*;
pub use intent::*;
pub use result::*;
pub use store::*;
pub use summary::*;
