//! Action handlers
//!
//! Every mutation runs decode → validate → attach identity → store call, in
//! that order. Ownership fields (`user`, `project`) are always taken from the
//! session and the route, never from the submitted form.

pub mod comment;
pub mod project;
pub mod vote;
