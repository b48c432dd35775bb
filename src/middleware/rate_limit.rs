use std::{rc::Rc, sync::Arc};

use actix_web::{web::Bytes, HttpRequest};

use crate::{
    errors::AppError,
    middleware::{HandlerFuture, Middleware, RequestHandler},
    rate_limit::{RateLimitDecision, RateLimiter},
};

/// Counts the request against `limiter` before anything else runs. Allowed
/// responses carry the `X-RateLimit-*` headers.
pub fn with_rate_limit(limiter: Arc<RateLimiter>) -> Middleware {
    Rc::new(move |next: RequestHandler| -> RequestHandler {
        let limiter = Arc::clone(&limiter);
        Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
            let limiter = Arc::clone(&limiter);
            let next = Rc::clone(&next);
            Box::pin(async move {
                let key = limiter.key_for(&req);

                match limiter.check(&key).await? {
                    RateLimitDecision::Rejected { retry_after } => {
                        log::warn!(
                            "Rate limit '{}' exceeded by {} on {}",
                            limiter.name(),
                            key,
                            req.path()
                        );
                        Err(AppError::TooManyRequests { retry_after })
                    }
                    RateLimitDecision::Allowed(status) => {
                        let mut response = next(req, body).await?;
                        status.apply_headers(&mut response);
                        Ok(response)
                    }
                }
            })
        })
    })
}
