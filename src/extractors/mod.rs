//! HTML extraction modules
//!
//! Each module derives one output from a parsed page.

mod link_extractor;
mod markdown_converter;
mod metadata_extractor;
mod path_expr;
mod selector_extractor;

pub use link_extractor::*;
pub use markdown_converter::*;
pub use metadata_extractor::*;
pub use path_expr::*;
pub use selector_extractor::*;
