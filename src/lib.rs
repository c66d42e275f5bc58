// quantblog: engagement backend for a Vietnamese quantitative-trading blog
//
// This is the library root. Each module corresponds to a major subsystem:
// the content store, the engagement services layered over it, and the
// surfaces (CLI output, web API) that drive them.

pub mod accounts;
pub mod analytics;
pub mod blog;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod output;
pub mod status;
pub mod storage;

#[cfg(feature = "web")]
pub mod web;
