pub mod discovery;

pub use discovery::{discover_folders, discover_images, find_variant_set, VariantSet};
