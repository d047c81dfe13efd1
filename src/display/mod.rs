//! Display formatting for terminal output
//!
//! Provides utilities for formatting catalog records for terminal display.

pub mod record;

pub use record::{
    format_record_count, format_record_details, format_record_json, format_record_list, RecordRow,
};
