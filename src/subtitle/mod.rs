pub mod catalog;

pub use catalog::{SubtitleBundle, SubtitleCatalog, SubtitleDescriptor};
