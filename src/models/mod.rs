//! Core data models for the jewelry catalogue.
//!
//! These entities represent collections, sub-categories, catalogued items and
//! the imported product metadata they are matched against. They map cleanly
//! to database tables via `sqlx::FromRow` and serialize as camelCase JSON via
//! `serde`.

pub mod category;
pub mod image;
pub mod metadata;
