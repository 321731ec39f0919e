use rocket::http::{ContentType, Header, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::{self, Responder, Response};
use rocket::{Request, State};

use crate::api::ApiError;
use crate::images::{CropMode, ImageFormat};
use crate::thumbnails::{Thumbnail, ThumbnailError, ThumbnailRequest, ThumbnailService};

/// `Cache-Control` policy for served thumbnails.
pub struct ClientCachePolicy {
    pub max_age: u64,
}

/// The caller's `Authorization` header, forwarded to the source store.
pub struct CallerAuthorization(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallerAuthorization {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(CallerAuthorization(
            req.headers().get_one("Authorization").map(str::to_string),
        ))
    }
}

// Responder for a cached thumbnail file
pub struct ImageResponse {
    pub thumbnail: Thumbnail,
    pub max_age: u64,
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let content_type =
            ContentType::parse_flexible(self.thumbnail.content_type()).unwrap_or(ContentType::Binary);
        let etag = self.thumbnail.stored.etag.clone();
        let cache_control = format!("public, max-age={}", self.max_age);

        // Check If-None-Match header
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .header(Header::new("Cache-Control", cache_control))
                    .ok();
            }
        }

        Response::build()
            .header(content_type)
            .header(Header::new(
                "Content-Disposition",
                format!("inline; filename=\"{}\"", self.thumbnail.file_name),
            ))
            .header(Header::new("Cache-Control", cache_control))
            .header(Header::new("ETag", etag))
            .sized_body(None, self.thumbnail.stored.file)
            .ok()
    }
}

#[derive(FromForm)]
pub struct ThumbnailQuery {
    #[field(name = uncased("url"))]
    pub url: Option<String>,
    #[field(name = uncased("size"))]
    pub size: Option<String>,
    #[field(name = uncased("mode"))]
    pub mode: Option<String>,
    #[field(name = uncased("format"))]
    pub format: Option<String>,
}

impl ThumbnailQuery {
    fn to_request(&self, service: &ThumbnailService) -> Result<ThumbnailRequest, ThumbnailError> {
        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(ThumbnailError::InvalidRequest("The url is required".to_string())),
        };

        let mode = match self.mode.as_deref().filter(|m| !m.is_empty()) {
            Some(mode) => mode.parse::<CropMode>().map_err(ThumbnailError::InvalidRequest)?,
            None => service.default_mode(),
        };

        let format = match self.format.as_deref().filter(|f| !f.is_empty()) {
            Some(format) => format.parse::<ImageFormat>().map_err(ThumbnailError::InvalidRequest)?,
            None => service.default_format(),
        };

        Ok(ThumbnailRequest::new(url, self.size.clone(), mode, format))
    }
}

#[get("/?<query..>")]
pub async fn get_thumbnail(
    query: ThumbnailQuery,
    authorization: CallerAuthorization,
    service: &State<ThumbnailService>,
    policy: &State<ClientCachePolicy>,
) -> Result<ImageResponse, ApiError> {
    let request = query.to_request(service)?;
    log::debug!("Thumbnail requested: {:?}", request);

    let thumbnail = service
        .get_or_create(&request, authorization.0.as_deref())
        .await?;

    Ok(ImageResponse {
        thumbnail,
        max_age: policy.max_age,
    })
}

#[derive(FromForm)]
pub struct InvalidateQuery {
    #[field(name = uncased("url"))]
    pub url: Option<String>,
}

#[delete("/?<query..>")]
pub async fn delete_thumbnails(
    query: InvalidateQuery,
    service: &State<ThumbnailService>,
) -> Result<Status, ApiError> {
    let url = query.url.unwrap_or_default();
    service.invalidate(url.trim()).await?;
    Ok(Status::NoContent)
}
