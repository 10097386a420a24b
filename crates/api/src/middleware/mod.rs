//! Request middleware.

pub mod acting_user;

pub use acting_user::{ACTING_USER_HEADER, ActingUser, acting_user_middleware};
