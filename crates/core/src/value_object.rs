//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values: two
/// `Coins` of 5 are the same value, while two families with the same balance
/// are still different families.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
