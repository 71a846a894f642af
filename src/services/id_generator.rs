//! Identifier generation for new objects.

use uuid::Uuid;

/// Source of fresh object identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random version-4 UUIDs drawn from the OS entropy source.
///
/// 122 random bits per id; `uuid` panics if the OS cannot provide entropy,
/// which the service surfaces at startup by generating a probe id.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}
