//! Binding Layer Tests
//!
//! End-to-end tests for the xapi binding against the in-memory driver:
//! - SessionOptions - option table, connection strings, TOML config
//! - Session - connection lifecycle, transactions, schema catalog
//! - Statement - clause building and execution
//! - QueryResult / Row - cursors, metadata, typed accessors

mod common;

mod options;
mod results;
mod scenarios;
mod sessions;
mod statements;
