//! Cross-module scenarios for promptdock-core
//!
//! Everything here runs against the SQLite backend in a temporary directory,
//! the way a host embeds the crate.

#[cfg(test)]
mod commands;
#[cfg(test)]
mod surfaces;
