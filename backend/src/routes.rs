use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{ErrorResponse, SubjectType};
use std::str::FromStr;
use uuid::Uuid;

use crate::analysis::analysis_service::AnalysisService;
use crate::providers::dispatcher::DispatchError;
use crate::upload::validator::{validate_upload, UploadError, UploadedImage, MAX_UPLOAD_BYTES};

const MAX_TEXT_FIELD_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] UploadError),
    #[error("unknown subject type: {0}")]
    UnknownSubject(String),
    #[error("malformed form data: {0}")]
    MalformedForm(String),
    #[error(transparent)]
    NotConfigured(DispatchError),
    #[error("{0}")]
    Internal(String),
}

impl AnalyzeError {
    fn error_label(&self) -> &'static str {
        match self {
            AnalyzeError::Validation(UploadError::Missing) => "No image file provided",
            AnalyzeError::Validation(_) => "Invalid image upload",
            AnalyzeError::UnknownSubject(_) => "Invalid analysis type",
            AnalyzeError::MalformedForm(_) => "Invalid form data",
            AnalyzeError::NotConfigured(_) => "Service not configured",
            AnalyzeError::Internal(_) => "Failed to process image",
        }
    }
}

impl From<MultipartError> for AnalyzeError {
    fn from(err: MultipartError) -> Self {
        if err.status_code().is_client_error() {
            AnalyzeError::MalformedForm(err.to_string())
        } else {
            AnalyzeError::Internal(err.to_string())
        }
    }
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::Validation(_)
            | AnalyzeError::UnknownSubject(_)
            | AnalyzeError::MalformedForm(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalyzeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.error_label().to_string(),
            details: self.to_string(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/analyze").route(web::post().to(analyze)))
        .service(web::resource("/api/crop-doctor/analyze").route(web::post().to(analyze)));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Backend server is running")
}

#[derive(Default)]
struct AnalysisForm {
    image: Option<UploadedImage>,
    subject: Option<String>,
}

async fn analyze(
    service: web::Data<AnalysisService>,
    payload: Multipart,
) -> Result<HttpResponse, AnalyzeError> {
    let request_id = Uuid::new_v4();
    let form = read_analysis_form(payload).await.inspect_err(|e| {
        warn!("[{}] Could not read analysis form: {}", request_id, e);
    })?;

    if let Err(e) = validate_upload(form.image.as_ref()) {
        warn!("[{}] Upload rejected: {}", request_id, e);
        return Err(e.into());
    }
    let image = form.image.ok_or(AnalyzeError::Validation(UploadError::Missing))?;

    let subject = parse_subject(form.subject.as_deref())?;
    info!(
        "[{}] Analysing {} image ({} bytes, sha256 {})",
        request_id,
        subject,
        image.byte_length(),
        image.digest()
    );

    match service.analyze(subject, &image).await {
        Ok(result) => Ok(HttpResponse::Ok().json(result)),
        Err(e) if e.is_configuration() => Err(AnalyzeError::NotConfigured(e)),
        Err(e) => {
            error!("[{}] Unexpected analysis failure: {:?}", request_id, e);
            Err(AnalyzeError::Internal(e.to_string()))
        }
    }
}

fn parse_subject(raw: Option<&str>) -> Result<SubjectType, AnalyzeError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(SubjectType::default()),
        Some(value) => SubjectType::from_str(value)
            .map_err(|_| AnalyzeError::UnknownSubject(value.to_string())),
    }
}

async fn read_analysis_form(mut payload: Multipart) -> Result<AnalysisForm, AnalyzeError> {
    let mut form = AnalysisForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" if form.image.is_none() => {
                form.image = Some(read_image_field(&mut field).await?);
            }
            "type" => {
                let bytes = read_text_field(&mut field).await?;
                form.subject = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            _ => drain_field(&mut field).await?,
        }
    }

    Ok(form)
}

/// Buffers up to the ceiling, then only counts, so oversized uploads can report their size.
async fn read_image_field(field: &mut Field) -> Result<UploadedImage, AnalyzeError> {
    let declared_mime = field.content_type().map(|mime| mime.to_string());
    let mut image_data = Vec::new();
    let mut measured = 0usize;

    while let Some(chunk) = field.next().await {
        let data = chunk?;
        measured += data.len();
        if measured <= MAX_UPLOAD_BYTES {
            image_data.extend_from_slice(&data);
        } else if !image_data.is_empty() {
            image_data = Vec::new();
        }
    }

    if measured <= MAX_UPLOAD_BYTES {
        Ok(UploadedImage::new(image_data, declared_mime))
    } else {
        Ok(UploadedImage::with_measured_length(
            image_data,
            declared_mime,
            measured,
        ))
    }
}

async fn read_text_field(field: &mut Field) -> Result<Vec<u8>, AnalyzeError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk?;
        let room = MAX_TEXT_FIELD_BYTES.saturating_sub(bytes.len());
        bytes.extend_from_slice(&data[..data.len().min(room)]);
    }
    Ok(bytes)
}

async fn drain_field(field: &mut Field) -> Result<(), AnalyzeError> {
    while let Some(chunk) = field.next().await {
        chunk?;
    }
    Ok(())
}
