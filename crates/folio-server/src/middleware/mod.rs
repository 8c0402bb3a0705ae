//! Request middleware.

pub(crate) mod context;
pub(crate) mod request_id;
pub(crate) mod security;
