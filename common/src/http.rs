use actix_web::{HttpResponse, Responder};
use serde::Serialize;

use super::error::Res;

pub struct Success;
impl Success {
    pub fn ok<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(body))
    }
    pub fn accepted<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Accepted().json(body))
    }
}
