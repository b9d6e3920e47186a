//! Column-wise feature transformers.

mod binarizer;
mod bucketizer;
mod string_indexer;

pub use binarizer::Binarizer;
pub use bucketizer::Bucketizer;
pub use string_indexer::{StringIndexer, StringIndexerModel};
