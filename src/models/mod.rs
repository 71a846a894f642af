//! Core data models for the ephemeral file store.
//!
//! A stored object is a payload plus the metadata needed to serve it back:
//! content type, optional filename, size and upload time.

pub mod object;
