//! Ready-made MCP servers shipped as binaries.

pub mod business;
pub mod math;

pub use business::{BUSINESS_SERVER_NAME, business_server};
pub use math::{MATH_SERVER_NAME, format_number, math_server};
