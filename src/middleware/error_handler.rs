use std::{panic::AssertUnwindSafe, rc::Rc};

use actix_web::{web::Bytes, HttpRequest, ResponseError};
use futures::FutureExt;

use crate::{
    errors::AppError,
    middleware::{get_request_id, HandlerFuture, Middleware, RequestHandler},
};

/// Outermost layer: the only place an [`AppError`] becomes an HTTP response.
/// A panic anywhere below is reported as a plain 500.
pub fn with_error_handler() -> Middleware {
    Rc::new(|next: RequestHandler| -> RequestHandler {
        Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
            let next = Rc::clone(&next);
            Box::pin(async move {
                let method = req.method().clone();
                let path = req.path().to_string();
                let request_id = get_request_id(&req).unwrap_or_else(|| "-".to_string());

                let outcome = AssertUnwindSafe(async move { next(req, body).await })
                    .catch_unwind()
                    .await;

                let err = match outcome {
                    Ok(Ok(response)) => return Ok(response),
                    Ok(Err(err)) => err,
                    Err(_) => {
                        log::error!("Handler panicked on {} {} [{}]", method, path, request_id);
                        AppError::InternalError("handler panicked".to_string())
                    }
                };

                if err.status_code().is_server_error() {
                    log::error!("{} {} [{}] failed: {}", method, path, request_id, err);
                } else {
                    log::debug!("{} {} rejected: {}", method, path, err);
                }

                Ok(err.error_response())
            })
        })
    })
}
