//! `{code, message, data}` response envelope shared by every endpoint

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

/// 200 with `message: "success"`
pub fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        code: StatusCode::OK.as_u16(),
        message: "success".to_string(),
        data: Some(data),
    })
}

/// Error envelope with `data: null`
pub fn failure(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()> {
        code: status.as_u16(),
        message: message.to_string(),
        data: None,
    })
}
