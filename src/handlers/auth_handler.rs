use actix_web::{
    web::{self, Bytes},
    HttpRequest, HttpResponse, ResponseError,
};
use serde::de::DeserializeOwned;

use crate::{
    app_state::AppState,
    auth::{cookies::refresh_token_from, current_claims, TokenError, CSRF_HEADER},
    errors::{AppError, AppResult},
    models::dto::{
        CsrfResponse, LoginRequest, LoginResponse, MessageResponse, ProfileResponse,
        RegisterRequest, RegisterResponse, SuccessResponse, UpdateProfileRequest,
    },
};

pub(crate) fn app_state(req: &HttpRequest) -> AppResult<web::Data<AppState>> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("Application state is not registered".to_string()))
}

/// An empty body reads as the default value so that missing fields surface as
/// field errors rather than a parse error.
fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("Rejected request body: {}", e);
        AppError::BadRequest("Invalid JSON body".to_string())
    })
}

/// `POST /auth/login`
pub async fn login(req: HttpRequest, body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let credentials = json_body::<LoginRequest>(&body)?.into_credentials()?;

    let outcome = state.auth_service.login(credentials).await?;

    let mut response = HttpResponse::Ok().json(LoginResponse {
        user: outcome.user.into(),
        success: true,
    });
    state
        .cookies
        .set_session(&mut response, &outcome.access_token, &outcome.refresh_token)?;
    Ok(response)
}

/// `POST /auth/refresh`. Reads the refresh cookie only. A rejected token also
/// clears the session cookies.
pub async fn refresh(req: HttpRequest, _body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;

    let result = match refresh_token_from(&req) {
        Some(token) => state.rotation.rotate(&token).await,
        None => Err(TokenError::InvalidRefreshToken.into()),
    };

    match result {
        Ok(rotated) => {
            let mut response = HttpResponse::Ok().json(SuccessResponse { success: true });
            state.cookies.set_session(
                &mut response,
                &rotated.access_token,
                &rotated.refresh_token,
            )?;
            Ok(response)
        }
        Err(err) if err.status_code().is_client_error() => {
            log::debug!("Refresh rejected: {}", err);
            let mut response = err.error_response();
            state.cookies.clear(&mut response)?;
            Ok(response)
        }
        Err(err) => Err(err),
    }
}

/// `GET /auth/csrf`
pub async fn csrf(req: HttpRequest, _body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let issued = state.csrf.issue_if_absent(&req);

    let mut response = HttpResponse::Ok()
        .insert_header((CSRF_HEADER, issued.token.as_str()))
        .json(CsrfResponse { ok: true });
    if issued.is_new {
        state.cookies.set_csrf_cookie(&mut response, &issued.token)?;
    }
    Ok(response)
}

/// `POST /auth/register`
pub async fn register(req: HttpRequest, body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let request = json_body::<RegisterRequest>(&body)?;

    let user = state.auth_service.register(request).await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Registration successful".to_string(),
        user_id: user.id,
    }))
}

/// `POST /auth/logout`
pub async fn logout(req: HttpRequest, _body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;

    if let Some(token) = refresh_token_from(&req) {
        if state.rotation.revoke_presented(&token).await? {
            log::info!("Refresh token revoked on logout");
        }
    }

    let mut response = HttpResponse::Ok().json(SuccessResponse { success: true });
    state.cookies.clear(&mut response)?;
    Ok(response)
}

/// `GET /auth/profile`
pub async fn profile(req: HttpRequest, _body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let claims = current_claims(&req)?;

    let user = state.auth_service.profile(&claims.user_id).await?;

    Ok(HttpResponse::Ok().json(ProfileResponse { user: user.into() }))
}

/// `PUT /auth/updateUserProfile`
pub async fn update_profile(req: HttpRequest, body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let claims = current_claims(&req)?;
    let request = json_body::<UpdateProfileRequest>(&body)?;

    let user = state
        .auth_service
        .update_profile(&claims.user_id, request)
        .await?;

    Ok(HttpResponse::Ok().json(ProfileResponse { user: user.into() }))
}

/// `POST /auth/deleteAccount`. Deletes the caller's own account and ends the
/// session.
pub async fn delete_account(req: HttpRequest, _body: Bytes) -> AppResult<HttpResponse> {
    let state = app_state(&req)?;
    let claims = current_claims(&req)?;

    state.auth_service.delete_account(&claims.user_id).await?;

    let mut response = HttpResponse::Ok().json(MessageResponse {
        message: "User deleted successfully".to_string(),
    });
    state.cookies.clear(&mut response)?;
    Ok(response)
}
