//! # Property Tree Model
//!
//! Clean DTOs shared by the engine and every `TreeStore` implementation.
//! These types cross every boundary: storage ↔ engine ↔ caller.
//!
//! Design rule: this module is pure data — no I/O, no state, no randomness.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;
pub mod weights;
pub mod vocab;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId, Direction};
pub use value::Value;
pub use property_map::PropertyMap;
pub use weights::WeightVec;
pub use vocab::{labels, props, rels};
