//! Pipeline stages for spreadsheet-to-notes rendering.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! parse ──▶ normalize ──▶ layout ──▶ render ──▶ archive
//! (calamine)  (fields)    (table)    (lopdf)    (zip)
//! ```
//!
//! 1. [`parse`]: decode the workbook and turn each data row of its first
//!    sheet into a [`parse::RawRecord`]
//! 2. [`normalize`]: fill placeholders for missing fields and write the
//!    amount out in words
//! 3. [`layout`]: the fixed (field, x, y, width) placement table
//! 4. [`render`]: draw one note over the background template; blocking,
//!    so the orchestrator runs it on the blocking pool
//! 5. [`archive`]: zip the finished notes straight into the archive file
//!
//! [`text`] holds the Helvetica metrics shared by layout and rendering.

pub mod archive;
pub mod layout;
pub mod normalize;
pub mod parse;
pub mod render;
pub mod text;
