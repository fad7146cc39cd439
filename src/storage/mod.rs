//! Storage implementations for entities without a custom database

pub mod in_memory;

pub use in_memory::InMemoryDataAccess;
