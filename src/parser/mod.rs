//! Parser module
//!
//! Everything that turns free text into structured values: the date/time parser, the
//! time normalizer built on it, and the fast-path command parser.

pub mod command;
pub mod date_parser;
pub mod time_normalizer;
pub mod utils;

pub use command::CommandParser;
pub use date_parser::{DateMatch, DateParser, NaturalDateParser, ParseSettings, ParsedMoment};
pub use time_normalizer::TimeNormalizer;
