mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::build_context;
use quiz_auth_server::{
    auth::TokenError,
    errors::AppError,
    models::domain::UserRole,
};

fn is_revoked_or_expired(err: &AppError) -> bool {
    matches!(err, AppError::Token(TokenError::RefreshTokenRevokedOrExpired))
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("a@b.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let r0 = rotation.issue(&user.id).await.expect("issue");
    let r1 = rotation.rotate(&r0.refresh_token).await.expect("first rotation");

    let replay = rotation.rotate(&r0.refresh_token).await.unwrap_err();
    assert!(is_revoked_or_expired(&replay));

    let r2 = rotation
        .rotate(&r1.refresh_token)
        .await
        .expect("successor is usable");
    assert_ne!(r1.token_id, r2.token_id);
}

#[tokio::test]
async fn rotation_links_predecessor_to_successor() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("chain@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let r0 = rotation.issue(&user.id).await.expect("issue");
    let r1 = rotation.rotate(&r0.refresh_token).await.expect("rotate r0");
    let r2 = rotation.rotate(&r1.refresh_token).await.expect("rotate r1");

    let rec0 = ctx.tokens.get(&r0.token_id).await.expect("r0 record kept");
    let rec1 = ctx.tokens.get(&r1.token_id).await.expect("r1 record kept");
    let rec2 = ctx.tokens.get(&r2.token_id).await.expect("r2 record kept");

    assert!(rec0.revoked);
    assert_eq!(rec0.replaced_by_token_id.as_deref(), Some(r1.token_id.as_str()));
    assert!(rec1.revoked);
    assert_eq!(rec1.replaced_by_token_id.as_deref(), Some(r2.token_id.as_str()));
    assert!(!rec2.revoked);
    assert!(rec2.replaced_by_token_id.is_none());

    assert_eq!(ctx.tokens.active_for_user(&user.id, Utc::now()).await, 1);
}

#[tokio::test]
async fn expired_record_is_rejected_without_rotation() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("late@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let r0 = rotation.issue(&user.id).await.expect("issue");
    let later = Utc::now() + ctx.state.config.refresh_token_ttl + Duration::seconds(1);

    let err = rotation
        .rotate_at(&r0.refresh_token, later)
        .await
        .unwrap_err();
    assert!(is_revoked_or_expired(&err));

    let rec0 = ctx.tokens.get(&r0.token_id).await.expect("record kept");
    assert!(!rec0.revoked);
    assert_eq!(ctx.tokens.len().await, 1);
}

#[tokio::test]
async fn deleted_user_cannot_rotate() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("gone@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let r0 = rotation.issue(&user.id).await.expect("issue");
    ctx.users.remove(&user.id).await;

    let err = rotation.rotate(&r0.refresh_token).await.unwrap_err();
    assert!(is_revoked_or_expired(&err));
    assert_eq!(ctx.tokens.len().await, 1);
}

#[tokio::test]
async fn rotated_access_token_carries_current_role() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("promoted@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let r0 = rotation.issue(&user.id).await.expect("issue");
    ctx.users.set_role(&user.id, UserRole::Creator).await;

    let rotated = rotation.rotate(&r0.refresh_token).await.expect("rotate");
    let claims = ctx
        .state
        .codec
        .verify(&rotated.access_token)
        .expect("access token verifies");

    assert_eq!(claims.user_id, user.id);
    assert_eq!(claims.role, UserRole::Creator);
    assert_eq!(rotated.user.role, UserRole::Creator);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("mixup@example.com", "Secret123!", UserRole::Student)
        .await;

    let access = ctx
        .state
        .codec
        .issue_access_token(&user.id, user.role)
        .expect("sign access token");

    let err = ctx.state.rotation.rotate(&access).await.unwrap_err();
    assert!(matches!(err, AppError::Token(_)));
    assert_eq!(ctx.tokens.len().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_has_exactly_one_winner() {
    const ATTEMPTS: usize = 8;

    let ctx = build_context();
    let user = ctx
        .users
        .seed("race@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = Arc::clone(&ctx.state.rotation);

    let r0 = rotation.issue(&user.id).await.expect("issue");

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let rotation = Arc::clone(&rotation);
            let token = r0.refresh_token.clone();
            tokio::spawn(async move { rotation.rotate(&token).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.expect("rotation task panicked") {
            Ok(rotated) => winners.push(rotated),
            Err(err) => assert!(is_revoked_or_expired(&err), "unexpected error: {err}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(ctx.tokens.active_for_user(&user.id, Utc::now()).await, 1);

    let rec0 = ctx.tokens.get(&r0.token_id).await.expect("r0 record kept");
    assert_eq!(
        rec0.replaced_by_token_id.as_deref(),
        Some(winners[0].token_id.as_str())
    );
}

#[tokio::test]
async fn revoke_all_for_user_ends_every_session() {
    let ctx = build_context();
    let user = ctx
        .users
        .seed("many@example.com", "Secret123!", UserRole::Student)
        .await;
    let rotation = &ctx.state.rotation;

    let first = rotation.issue(&user.id).await.expect("issue first");
    let second = rotation.issue(&user.id).await.expect("issue second");

    assert_eq!(rotation.revoke_all_for_user(&user.id).await.expect("revoke"), 2);

    for token in [first.refresh_token, second.refresh_token] {
        let err = rotation.rotate(&token).await.unwrap_err();
        assert!(is_revoked_or_expired(&err));
    }
}
