mod document;
mod page_index;
mod source;
mod text;
pub mod elements;

pub use document::{DocumentMetadata, PdfDocument};
pub use elements::{Element, ElementCategory};
pub use page_index::PageIndex;
pub use source::{PageSource, PdfPageSource};
pub use text::{TextBlock, TextExtractor};
