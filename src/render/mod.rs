//! Output renderers over the unified document model.

mod json;
mod markdown;
mod options;
mod text;

pub use json::to_json;
pub use markdown::to_markdown;
pub use options::{JsonFormat, RenderOptions};
pub use text::to_text;
