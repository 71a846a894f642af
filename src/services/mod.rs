//! Object storage services: id generation, the store contract and its
//! in-memory and on-disk backends.

pub mod disk_store;
pub mod id_generator;
pub mod memory_store;
pub mod object_store;
