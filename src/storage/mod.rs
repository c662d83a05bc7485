pub mod local;
pub mod staging;
pub mod traits;

pub use local::LocalStorage;
pub use staging::{StagedFile, StagingArea};
pub use traits::Storage;
