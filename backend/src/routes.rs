use actix_files::Files;
use actix_multipart::{Field, Multipart};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde_json::json;
use shared::{ErrorResponse, ImageMimeType};
use uuid::Uuid;

use crate::classifier::{ClassificationClient, ClassificationFailure};
use crate::config::AppConfig;
use crate::encoder;
use crate::upload::{self, UploadError};

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<String>) {
    cfg.service(web::resource("/api/classify").route(web::post().to(handle_classify)))
        .service(web::resource("/api/health").route(web::get().to(health)));

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: message.into(),
    })
}

fn upload_error_response(err: &UploadError) -> HttpResponse {
    let status = match err {
        UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UploadError::MissingImage | UploadError::Empty | UploadError::Multipart(_) => {
            StatusCode::BAD_REQUEST
        }
    };
    error_response(status, err.to_string())
}

fn failure_response(err: &ClassificationFailure) -> HttpResponse {
    error_response(StatusCode::BAD_GATEWAY, err.to_string())
}

struct UploadedImage {
    data: Vec<u8>,
    mime_type: ImageMimeType,
    file_name: Option<String>,
}

fn is_file_field(field: &Field) -> bool {
    field
        .content_disposition()
        .map(|cd| cd.get_filename().is_some())
        .unwrap_or(false)
        || field.content_type().is_some()
}

/// Takes the first file field; everything after it is ignored.
async fn read_image(payload: &mut Multipart, max_bytes: usize) -> Result<UploadedImage, UploadError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if !is_file_field(&field) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        let mime_type = upload::accept_mime_type(&content_type)?;
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(str::to_string));

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
            data.extend_from_slice(&chunk);
            if data.len() > max_bytes {
                return Err(UploadError::TooLarge {
                    size: data.len(),
                    max: max_bytes,
                });
            }
        }
        upload::validate_image_size(&data, max_bytes)?;

        return Ok(UploadedImage {
            data,
            mime_type,
            file_name,
        });
    }

    Err(UploadError::MissingImage)
}

async fn handle_classify(
    client: web::Data<ClassificationClient>,
    config: web::Data<AppConfig>,
    mut payload: Multipart,
) -> HttpResponse {
    let request_id = Uuid::new_v4();

    let image = match read_image(&mut payload, config.max_upload_bytes).await {
        Ok(image) => image,
        Err(e) => {
            warn!("[{}] Rejected upload: {}", request_id, e);
            return upload_error_response(&e);
        }
    };

    info!(
        "[{}] Classifying {} ({} bytes, {}, sha256 {})",
        request_id,
        image.file_name.as_deref().unwrap_or("<unnamed>"),
        image.data.len(),
        image.mime_type,
        upload::image_digest(&image.data)
    );

    let transport = match encoder::encode(image.data.as_slice(), image.mime_type) {
        Ok(transport) => transport,
        Err(e) => {
            error!("[{}] Failed to encode image: {}", request_id, e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match client.classify(&transport).await {
        Ok(result) => {
            info!(
                "[{}] Classified as {} (weed: {}, confidence: {})",
                request_id, result.class, result.is_weed, result.confidence
            );
            HttpResponse::Ok().json(result)
        }
        Err(e) => {
            error!("[{}] Classification failed ({:?})", request_id, e.kind());
            failure_response(&e)
        }
    }
}

async fn health(client: web::Data<ClassificationClient>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "model": client.model(),
    }))
}
