use std::{rc::Rc, sync::Arc};

use actix_web::{web::Bytes, HttpMessage, HttpRequest};

use crate::{
    auth::{current_claims, extract_token, require_role, TokenCodec},
    errors::AppError,
    middleware::{compose, HandlerFuture, Middleware, RequestHandler},
    models::domain::UserRole,
};

/// Verifies the access token (header first, then cookie) and attaches its
/// claims to the request for the layers and handler below.
pub fn with_auth(codec: Arc<TokenCodec>) -> Middleware {
    Rc::new(move |next: RequestHandler| -> RequestHandler {
        let codec = Arc::clone(&codec);
        Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
            let codec = Arc::clone(&codec);
            let next = Rc::clone(&next);
            Box::pin(async move {
                let token = extract_token(&req)
                    .ok_or_else(|| AppError::Auth("Authentication required".to_string()))?;
                let claims = codec.verify(&token)?;

                req.extensions_mut().insert(claims);
                next(req, body).await
            })
        })
    })
}

/// Must sit below [`with_auth`].
pub fn require_roles(roles: &[UserRole]) -> Middleware {
    let roles: Rc<[UserRole]> = roles.into();
    Rc::new(move |next: RequestHandler| -> RequestHandler {
        let roles = Rc::clone(&roles);
        Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
            let roles = Rc::clone(&roles);
            let next = Rc::clone(&next);
            Box::pin(async move {
                let claims = current_claims(&req)?;
                if let Err(err) = require_role(&claims, &roles) {
                    log::warn!(
                        "User {} with role {} denied on {}",
                        claims.user_id,
                        claims.role,
                        req.path()
                    );
                    return Err(err);
                }
                next(req, body).await
            })
        })
    })
}

/// Authentication then role check around `handler`. The handler only runs for
/// a valid token whose role is in `roles`.
pub fn with_role(
    codec: Arc<TokenCodec>,
    roles: &[UserRole],
    handler: RequestHandler,
) -> RequestHandler {
    compose(vec![with_auth(codec), require_roles(roles)])(handler)
}
