//! The tracing mark-and-sweep heap backing interpreted arrays and strings
//! (spec §4.G).

pub mod heap;

pub use heap::{GcHeap, GcObject, ObjectId, Value};
