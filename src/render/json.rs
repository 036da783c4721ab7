//! JSON renderer: serde over the model, verbatim.

use crate::error::{Error, Result};
use crate::model::Document;

use super::options::JsonFormat;

pub fn to_json(document: &Document, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(document),
        JsonFormat::Compact => serde_json::to_string(document),
    };
    result.map_err(|e| Error::Render(e.to_string()))
}
