pub mod olx_parser;

pub use olx_parser::{ExtractedPage, OlxParser, Parser};
