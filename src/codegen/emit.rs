//! Renderers
//!
//! A [`Renderer`] turns the IR into text. Template engines plug in here; the
//! built-in [`JsonRenderer`] writes the IR itself.

use super::ir::GeneratedOutput;
use crate::error::Result;

/// Seam between the analysis pipeline and a template engine
pub trait Renderer {
    fn render(&self, output: &GeneratedOutput) -> Result<String>;
}

/// Serializes the IR as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl JsonRenderer {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, output: &GeneratedOutput) -> Result<String> {
        let mut text = if self.pretty {
            serde_json::to_string_pretty(output)?
        } else {
            serde_json::to_string(output)?
        };
        text.push('\n');
        Ok(text)
    }
}
