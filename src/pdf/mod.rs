//! Native PDF structural decoder.
//!
//! Parses the object graph (xref tables and streams, incremental
//! updates, object streams), decodes stream filters, and interprets
//! page content streams into positioned text runs.

mod content;
mod filters;
mod fonts;
mod graph;
mod lexer;
mod object;
mod parser;
pub(crate) mod reader;
mod xref;

pub use content::{ContentInterpreter, TextSpan};
pub use filters::decode_stream_data;
pub use graph::ObjectGraph;
pub use object::{Dictionary, Object, ObjectId, Stream};
pub use reader::PdfReader;
pub use xref::XrefEntry;
