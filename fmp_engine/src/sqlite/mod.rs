//! SQLite backend for the marketplace engine.
//!
//! SQLite allows a single writer at a time. Every write transaction in this backend begins with a write statement so
//! that it takes the write lock up front, and connections wait on a busy timeout rather than failing immediately.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
