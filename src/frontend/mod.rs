pub mod reader;
pub mod reader_error;
