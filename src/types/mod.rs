//! Value types: element addresses, the type bitmask and access levels.

pub mod access;
pub mod addr;
pub mod sc_type;

/// Read/write access levels carried by contexts and elements.
pub use access::AccessLevels;
/// Packed `(segment, offset)` element address.
pub use addr::ScAddr;
/// Bitmask element type with narrowing predicates.
pub use sc_type::ScType;
