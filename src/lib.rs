//! PDF to slide deck conversion.
//!
//! Every page of a PDF is rasterized and placed as a full-height picture on
//! its own slide of a PPTX presentation, in page order.

pub mod converter;
pub mod deck;
pub mod image_processor;
pub mod pdf_processor;
pub mod template;
pub mod types;

pub use converter::Converter;
pub use deck::{Deck, Picture, Slide};
pub use pdf_processor::{PageRenderer, PdfProcessor};
pub use types::*;
