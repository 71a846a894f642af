//! HTTP handlers. Thin glue between requests and the object store.

pub mod health_handlers;
pub mod object_handlers;
pub mod usage_handlers;
