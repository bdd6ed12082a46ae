//! Pipeline stages for form stamping.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ render ──▶ composite   (preview, display only)
//!    │                      ▲
//!    │       captures ──────┤
//!    │                      ▼
//!    └─────────────────▶ stamp ──▶ drive upload
//! ```
//!
//! 1. [`source`]: obtain PDF bytes (bundled file, upload, Drive)
//! 2. [`render`]: rasterise every page at one scale; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`composite`]: overlay captures onto rendered pages for preview
//! 4. [`stamp`]: embed captures into a fresh copy of the document
//! 5. [`encode`]: PNG and data-URI helpers shared by the stages above

pub mod composite;
pub mod encode;
pub mod render;
pub mod source;
pub mod stamp;
