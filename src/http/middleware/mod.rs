//! Request middleware.

pub mod access_control;

pub use access_control::{caller_identity_middleware, CallerContext};
