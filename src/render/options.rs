//! Renderer configuration.

/// JSON output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Human-readable, indented.
    #[default]
    Pretty,
    /// Single line, machine-oriented.
    Compact,
}

/// Markdown rendering knobs.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Emit a `---` rule between pages.
    pub page_breaks: bool,

    /// Emit `![image](...)` placeholders for image blocks.
    pub image_placeholders: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_breaks: true,
            image_placeholders: true,
        }
    }
}
