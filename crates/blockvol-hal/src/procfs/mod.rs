//! Parsers for files under `/proc`.

pub mod mountinfo;
