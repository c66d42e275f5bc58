// HTTP handlers, one module per resource.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod engagement;
pub mod posts;
pub mod settings;
