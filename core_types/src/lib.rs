//! # Core Types
//!
//! This crate defines the fundamental identifiers shared by every layer of
//! the continuation stack.
//!
//! ## Philosophy
//!
//! - **Handles, not references**: UI entities are named by opaque ids that
//!   the host resolves. Nothing here keeps a UI entity alive.
//! - **Type safety first**: contexts, fragments and request codes cannot be
//!   confused with each other.
//!
//! ## Key Types
//!
//! - [`ContextId`]: Handle to an activity or application context
//! - [`FragmentId`]: Handle to one fragment instance
//! - [`RequestCode`]: Correlates a UI request with its result
//! - [`ClassName`]: Runtime class of a UI entity

pub mod class_name;
pub mod ids;
pub mod request_code;

pub use class_name::ClassName;
pub use ids::{ContextId, FragmentId};
pub use request_code::RequestCode;
