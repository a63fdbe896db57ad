//! Route handlers

pub mod inference;
pub mod models;
pub mod system;
