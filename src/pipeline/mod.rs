//! Pipeline stages for crawl-to-MDC conversion.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! submit ──▶ poll ──▶ title ──▶ format ──▶ transform
//! (payload)  (status)  (stem)    (prose)    (front matter + write)
//! ```
//!
//! 1. [`submit`]: shape the payload for the operation kind and turn the
//!    submit response into a [`crate::document::Submission`]
//! 2. [`poll`]: the job-status state machine; the only stage that waits
//! 3. [`title`]: heuristic title cascade and filename sanitisation
//! 4. [`format`]: best-effort prose formatter with a fallback contract
//! 5. [`transform`]: assemble and write one artifact per document

pub mod format;
pub mod poll;
pub mod submit;
pub mod title;
pub mod transform;
