//! Source side: the WordPress REST API and its raw record shapes.

pub mod wordpress;

pub use wordpress::{COLLECTIONS, WordPressClient};
