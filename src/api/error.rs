use std::io::Cursor;

use rocket::http::{ContentType, Status};
use serde_json::json;

use crate::thumbnails::ThumbnailError;

#[derive(Debug)]
pub enum ApiError {
    ThumbnailError(ThumbnailError),
}

impl From<ThumbnailError> for ApiError {
    fn from(error: ThumbnailError) -> Self {
        ApiError::ThumbnailError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::ThumbnailError(ThumbnailError::InvalidRequest(_)) => Status::BadRequest,
            ApiError::ThumbnailError(ThumbnailError::Fetch(_)) => Status::NotFound,
            ApiError::ThumbnailError(ThumbnailError::Transform(_)) => Status::BadRequest,
            ApiError::ThumbnailError(ThumbnailError::Store(_)) => Status::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::ThumbnailError(ThumbnailError::InvalidRequest(message)) => message.clone(),
            ApiError::ThumbnailError(ThumbnailError::Fetch(_)) => "Image access failed".to_string(),
            ApiError::ThumbnailError(ThumbnailError::Transform(_)) => {
                "The format of the requested image is not supported".to_string()
            }
            ApiError::ThumbnailError(ThumbnailError::Store(_)) => {
                "The thumbnail cache is unavailable".to_string()
            }
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        if let ApiError::ThumbnailError(ThumbnailError::Store(ref error)) = self {
            log::error!("Thumbnail cache failure: {}", error);
        }

        let body = json!({ "message": self.message() }).to_string();

        rocket::Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreError;
    use crate::images::{FetchError, TransformError};

    #[test]
    fn maps_thumbnail_errors_to_statuses() {
        let cases = [
            (ThumbnailError::InvalidRequest("bad size".into()), Status::BadRequest),
            (
                ThumbnailError::Fetch(FetchError::UpstreamStatus(reqwest::StatusCode::FORBIDDEN)),
                Status::NotFound,
            ),
            (
                ThumbnailError::Transform(TransformError::Decode("garbage".into())),
                Status::BadRequest,
            ),
            (
                ThumbnailError::Store(StoreError {
                    path: "/cache".into(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                }),
                Status::InternalServerError,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn invalid_requests_keep_their_message() {
        let error = ApiError::from(ThumbnailError::InvalidRequest("The url is required".into()));
        assert_eq!(error.status(), Status::BadRequest);
        assert_eq!(error.message(), "The url is required");
    }

    #[test]
    fn fetch_and_transform_failures_have_distinct_messages() {
        let fetch = ApiError::from(ThumbnailError::Fetch(FetchError::ClientError("x".into())));
        let transform = ApiError::from(ThumbnailError::Transform(TransformError::Decode("x".into())));
        assert_eq!(fetch.message(), "Image access failed");
        assert_eq!(
            transform.message(),
            "The format of the requested image is not supported"
        );
    }
}
