//! Value object trait: equality by value, not identity.
//!
//! Control codes, document numbers and tax ids are value objects: two instances
//! with the same digits are the same value, and "changing" one means building a
//! new one.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Constructors are
/// expected to validate, so holding an instance means holding a well-formed
/// value.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct DocumentNumber { establishment: u16, point_of_sale: u16, sequence: u32 }
///
/// impl ValueObject for DocumentNumber {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
