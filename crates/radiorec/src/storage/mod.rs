pub mod media;

pub use media::{MediaPath, MediaStorage, StorageConfig};
