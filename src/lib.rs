#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod images;
pub mod thumbnails;

pub use thumbnails::{Thumbnail, ThumbnailError, ThumbnailRequest, ThumbnailService};
