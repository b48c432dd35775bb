use std::rc::Rc;

use actix_web::{
    http::header::{HeaderName, HeaderValue},
    web::Bytes,
    HttpRequest,
};

use crate::{
    auth::{csrf::cookie_token, CsrfGuard, CSRF_HEADER},
    errors::AppError,
    middleware::{HandlerFuture, Middleware, RequestHandler},
};

/// Rejects state-changing requests whose header token does not match the
/// cookie token, and echoes the cookie token on the way out.
pub fn with_csrf(guard: CsrfGuard) -> Middleware {
    Rc::new(move |next: RequestHandler| -> RequestHandler {
        Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
            let next = Rc::clone(&next);
            Box::pin(async move {
                if guard.requires_check(req.method()) && !guard.validate_request(&req) {
                    log::warn!("CSRF validation failed for {} {}", req.method(), req.path());
                    return Err(AppError::Forbidden("Invalid CSRF token".to_string()));
                }

                let echoed = cookie_token(&req);
                let mut response = next(req, body).await?;

                if let Some(value) = echoed.and_then(|t| HeaderValue::from_str(&t).ok()) {
                    if !response.headers().contains_key(CSRF_HEADER) {
                        response
                            .headers_mut()
                            .insert(HeaderName::from_static(CSRF_HEADER), value);
                    }
                }

                Ok(response)
            })
        })
    })
}
