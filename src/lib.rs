//! Fetch posts from a source site, rewrite them with a language model, and
//! publish them to WordPress.
//!
//! State lives in a local SQLite file as JSON documents under fixed keys
//! (see [`storage`]). The [`pipeline`] module drives batches over the
//! [`source`], [`rewrite`] and [`publish`] adapters.

pub mod config;
pub mod pipeline;
pub mod publish;
pub mod rewrite;
pub mod source;
pub mod storage;
pub mod util;
