//! Runtime object model: the value universe, ownership handles, truthiness,
//! comparison dispatch, and the output-context collaborators.

pub mod compare;
pub mod context;
pub mod error;
pub mod object;

pub use compare::Comparator;
pub use context::{Context, DummyContext};
pub use error::RuntimeError;
pub use object::{Class, Closure, Instance, Method, Object, ObjectHolder, call_method, is_true};
