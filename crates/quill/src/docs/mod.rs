//! Hosted document layer.
//!
//! - [`model`]: wire types, offsets in UTF-16 code units.
//! - [`client`]: the [`DocumentService`](client::DocumentService) seam and
//!   the REST client.
//! - [`memory`]: an in-memory service with the same offset rules.
//! - [`formatter`]: styled insert batches.
//! - [`markers`]: anchor pairs, matcher tiers, range merging.
//! - [`writer`]: skeleton, section write/read, finalize.

pub mod client;
pub mod formatter;
pub mod markers;
pub mod memory;
pub mod model;
pub mod writer;

pub use client::{DocumentService, EnvToken, GoogleDocsClient, StaticToken, TokenSource};
pub use formatter::{AcademicFormatter, FormatStyle};
pub use memory::InMemoryDocuments;
pub use model::{Document, Request, Span};
pub use writer::DocumentWriter;
