//! Per-route handler pipeline.
//!
//! A [`Middleware`] turns one [`RequestHandler`] into another. Routes are
//! assembled with [`Pipeline`], which always applies the layers in the same
//! order regardless of how the builder was called:
//!
//! error handler -> rate limiter -> CSRF guard -> authentication/role -> handler
//!
//! The error handler is outermost so that every failure of an inner layer
//! reaches the client as the uniform JSON error body.

pub mod auth;
pub mod csrf;
pub mod error_handler;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

use std::{future::Future, rc::Rc, sync::Arc};

use actix_web::{web::Bytes, HttpRequest, HttpResponse, Route};
use futures::future::LocalBoxFuture;

use crate::{
    auth::{CsrfGuard, TokenCodec},
    errors::AppResult,
    models::domain::UserRole,
    rate_limit::RateLimiter,
};

pub use auth::{require_roles, with_auth, with_role};
pub use csrf::with_csrf;
pub use error_handler::with_error_handler;
pub use rate_limit::with_rate_limit;
pub use request_id::{get_request_id, RequestId, RequestIdMiddleware, REQUEST_ID_HEADER};
pub use security_headers::SecurityHeaders;

pub type HandlerFuture = LocalBoxFuture<'static, AppResult<HttpResponse>>;
pub type RequestHandler = Rc<dyn Fn(HttpRequest, Bytes) -> HandlerFuture>;
pub type Middleware = Rc<dyn Fn(RequestHandler) -> RequestHandler>;

/// Boxes an async fn into a [`RequestHandler`].
pub fn handler<F, Fut>(f: F) -> RequestHandler
where
    F: Fn(HttpRequest, Bytes) -> Fut + 'static,
    Fut: Future<Output = AppResult<HttpResponse>> + 'static,
{
    Rc::new(move |req: HttpRequest, body: Bytes| -> HandlerFuture {
        Box::pin(f(req, body))
    })
}

/// `compose(vec![a, b, c])(h) == a(b(c(h)))`
pub fn compose(middlewares: Vec<Middleware>) -> Middleware {
    Rc::new(move |inner: RequestHandler| -> RequestHandler {
        middlewares
            .iter()
            .rev()
            .fold(inner, |next, middleware| middleware(next))
    })
}

/// Mounts a pipeline-built handler on an actix route.
pub fn into_route(route: Route, handler: RequestHandler) -> Route {
    route.to(move |req: HttpRequest, body: Bytes| {
        let handler = Rc::clone(&handler);
        async move { handler(req, body).await }
    })
}

#[derive(Default)]
pub struct Pipeline {
    rate_limit: Option<Middleware>,
    csrf: Option<Middleware>,
    auth: Option<Middleware>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limit(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limit = Some(with_rate_limit(limiter));
        self
    }

    pub fn csrf(mut self, guard: CsrfGuard) -> Self {
        self.csrf = Some(with_csrf(guard));
        self
    }

    pub fn authenticated(mut self, codec: Arc<TokenCodec>) -> Self {
        self.auth = Some(with_auth(codec));
        self
    }

    /// Authentication followed by a role check.
    pub fn role(mut self, codec: Arc<TokenCodec>, roles: &[UserRole]) -> Self {
        self.auth = Some(compose(vec![with_auth(codec), require_roles(roles)]));
        self
    }

    pub fn layers(self) -> Vec<Middleware> {
        let mut layers = vec![with_error_handler()];
        layers.extend(self.rate_limit);
        layers.extend(self.csrf);
        layers.extend(self.auth);
        layers
    }

    pub fn wrap(self, handler: RequestHandler) -> RequestHandler {
        compose(self.layers())(handler)
    }

    pub fn route(self, route: Route, handler: RequestHandler) -> Route {
        into_route(route, self.wrap(handler))
    }
}
