//! # Secure Property Graph Model
//!
//! DTOs shared by every layer: storage ↔ index ↔ query ↔ user.
//!
//! Design rule: this module is pure data, with no I/O and no async. Visibility
//! checks live here so every read path shares one implementation.

pub mod element;
pub mod mutation;
pub mod property;
pub mod value;
pub mod visibility;

pub use element::{Direction, EdgeEnds, Element, ElementKind, ElementState, ElementType, Properties};
pub use mutation::{ElementBuilder, ElementMutation};
pub use property::{CellKind, Metadata, Property, PropertyId, PropertyRemoveMutation, DEFAULT_KEY};
pub use value::{DataType, StreamingValue, Value};
pub use visibility::{is_hidden, Authorizations, Visibility};
