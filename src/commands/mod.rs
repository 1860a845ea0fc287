//! CLI command handlers

pub mod collections;
pub mod load;

use serde::Serialize;

/// Emit a command result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> crate::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
