use actix_web::{
    post,
    web::{Data, Query, ServiceConfig, scope},
    HttpResponse, Responder,
};
use actix_web_validator::Json;
use tracing::error;

use super::dto::{ApplyNowResponse, CategorizeResponse, SweepResponse};
use super::models::{ApplyNowRequest, CategorizeQuery};
use super::service::{ApplyService, ServiceError};

/// Manual apply trigger. Always answers with a structured `{ok, attempted}`
/// body: an unknown user is `ok: false` with 200 (nothing to do), a missing
/// mailer credential is a 500, and per-job failures stay server-side.
#[post("/now")]
async fn apply_now(service: Data<ApplyService>, req: Json<ApplyNowRequest>) -> impl Responder {
    match service.apply_now(&req.uid, &req.title_tags).await {
        Ok(run) => HttpResponse::Ok().json(ApplyNowResponse::from(run)),
        Err(ServiceError::NotFound(msg)) => HttpResponse::Ok().json(ApplyNowResponse::failure(msg)),
        Err(e @ ServiceError::Configuration(_)) => {
            error!("apply-now rejected: {}", e);
            HttpResponse::InternalServerError().json(ApplyNowResponse::failure(e.to_string()))
        }
        Err(e) => {
            error!("apply-now failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ApplyNowResponse::failure("apply run failed".to_string()))
        }
    }
}

/// All-users sweep, normally driven by the scheduler; exposed for
/// operational use.
#[post("/sweep")]
async fn sweep(service: Data<ApplyService>) -> impl Responder {
    match service.sweep().await {
        Ok(summary) => HttpResponse::Ok().json(SweepResponse::from(summary)),
        Err(e) => {
            error!("sweep failed: {}", e);
            HttpResponse::InternalServerError().json(SweepResponse {
                ok: false,
                users: 0,
                attempted: 0,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Classification pass over untagged postings.
#[post("/categorize")]
async fn categorize(service: Data<ApplyService>, q: Query<CategorizeQuery>) -> impl Responder {
    match service.categorize(q.limit).await {
        Ok(updated) => HttpResponse::Ok().json(CategorizeResponse {
            ok: true,
            updated,
            error: None,
        }),
        Err(e) => {
            error!("categorize failed: {}", e);
            HttpResponse::InternalServerError().json(CategorizeResponse {
                ok: false,
                updated: 0,
                error: Some(e.to_string()),
            })
        }
    }
}

pub fn apply_config(config: &mut ServiceConfig) {
    config.service(scope("apply").service(apply_now).service(sweep).service(categorize));
}
