use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    HttpRequest, HttpResponse,
};
use chrono::Duration;

use crate::{
    auth::csrf::CSRF_COOKIE,
    config::Config,
    errors::AppResult,
};

pub const ACCESS_TOKEN_COOKIE: &str = "token";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Attaches and clears the session cookies on outgoing responses.
#[derive(Clone, Debug)]
pub struct SessionCookieWriter {
    secure: bool,
    access_max_age: Duration,
    refresh_max_age: Duration,
}

impl SessionCookieWriter {
    pub fn new(secure: bool, access_max_age: Duration, refresh_max_age: Duration) -> Self {
        Self {
            secure,
            access_max_age,
            refresh_max_age,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.environment.is_production(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(ACCESS_TOKEN_COOKIE, token.to_string())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(to_cookie_duration(self.access_max_age))
            .finish()
    }

    /// Strict same-site: the refresh token never needs to travel cross-site.
    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(REFRESH_TOKEN_COOKIE, token.to_string())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(to_cookie_duration(self.refresh_max_age))
            .finish()
    }

    pub fn csrf_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(CSRF_COOKIE, token.to_string())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .finish()
    }

    pub fn set_access_cookie(&self, response: &mut HttpResponse, token: &str) -> AppResult<()> {
        response.add_cookie(&self.access_cookie(token))?;
        Ok(())
    }

    pub fn set_refresh_cookie(&self, response: &mut HttpResponse, token: &str) -> AppResult<()> {
        response.add_cookie(&self.refresh_cookie(token))?;
        Ok(())
    }

    pub fn set_csrf_cookie(&self, response: &mut HttpResponse, token: &str) -> AppResult<()> {
        response.add_cookie(&self.csrf_cookie(token))?;
        Ok(())
    }

    pub fn set_session(
        &self,
        response: &mut HttpResponse,
        access_token: &str,
        refresh_token: &str,
    ) -> AppResult<()> {
        self.set_access_cookie(response, access_token)?;
        self.set_refresh_cookie(response, refresh_token)
    }

    /// Expires both session cookies on the client.
    pub fn clear(&self, response: &mut HttpResponse) -> AppResult<()> {
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let cookie = Cookie::build(name, "")
                .http_only(true)
                .secure(self.secure)
                .path("/")
                .max_age(CookieDuration::ZERO)
                .finish();
            response.add_cookie(&cookie)?;
        }
        Ok(())
    }
}

pub fn refresh_token_from(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn to_cookie_duration(duration: Duration) -> CookieDuration {
    CookieDuration::seconds(duration.num_seconds())
}
