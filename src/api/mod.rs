pub mod error;
pub mod thumbnails;

pub use error::ApiError;

use rocket::figment::Figment;
use rocket::{Build, Rocket};

use crate::thumbnails::ThumbnailService;
use self::thumbnails::ClientCachePolicy;

/// Assemble the Rocket instance serving the thumbnail routes under `/api/thumbnails`.
pub fn build_rocket(figment: Figment, service: ThumbnailService, max_age: u64) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(service)
        .manage(ClientCachePolicy { max_age })
        .mount(
            "/api/thumbnails",
            routes![thumbnails::get_thumbnail, thumbnails::delete_thumbnails],
        )
}
