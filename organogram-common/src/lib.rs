//! # Organogram Common Library
//!
//! Shared code for the organogram tools including:
//! - The canonical post model (senior and junior posts)
//! - Configuration loading
//! - Error types

pub mod config;
pub mod error;
pub mod post;

pub use error::{Error, Result};
pub use post::{Amount, DataSource, JuniorPost, Period, Post, PostStatus, ROOT_SENTINEL};
