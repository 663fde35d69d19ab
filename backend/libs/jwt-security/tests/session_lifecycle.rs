//! End-to-end issue / authenticate / revoke flows over the in-memory store

use chrono::Duration;
use jwt_security::test_utils::{hashed_key_settings, tamper_signature, test_settings, TestStack};
use jwt_security::{
    AuthFailureKind, Claims, Clock, JwtSettings, Revocation, RevocationError, TokenAuthenticator,
    TokenCodec, TokenError,
};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn issue_then_verify_returns_subject() {
    let stack = TestStack::new();

    for subject in ["alice", "bob", "user.with-dots_and_underscores", "ユーザー"] {
        let token = stack.codec.issue(subject).unwrap();
        let claims = stack.codec.verify(&token).unwrap();
        assert_eq!(claims.username, subject);
        assert_eq!(claims.sub, subject);
        assert!(claims.issued_at() <= stack.clock.now());
        assert!(claims.expires_at() > stack.clock.now());
    }
}

#[tokio::test]
async fn revocation_narrows_acceptance() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    assert!(stack.authenticator.authenticate(&token).await.is_ok());

    let claims = stack.codec.verify(&token).unwrap();
    stack
        .ledger
        .revoke(&token, claims.expires_at())
        .await
        .unwrap();

    let err = stack.authenticator.authenticate(&token).await.unwrap_err();
    assert_eq!(err.kind(), AuthFailureKind::Revoked);
    assert!(stack.codec.verify(&token).is_ok());

    // Other sessions of the same user are unaffected
    let second = stack.authenticator.issue("alice").unwrap();
    assert_ne!(second, token);
    assert!(stack.authenticator.authenticate(&second).await.is_ok());
}

#[tokio::test]
async fn revocation_entry_does_not_outlive_token() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    stack.authenticator.invalidate(&token).await.unwrap();
    assert_eq!(stack.ledger.count().await.unwrap(), 1);

    stack.clock.advance(Duration::hours(24));

    assert_eq!(stack.ledger.count().await.unwrap(), 0);
    let err = stack.authenticator.authenticate(&token).await.unwrap_err();
    assert_eq!(err.kind(), AuthFailureKind::Expired);
}

#[tokio::test]
async fn second_revocation_and_expired_revocation_are_soft() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    let expires_at = stack.codec.verify(&token).unwrap().expires_at();

    assert_eq!(
        stack.ledger.revoke(&token, expires_at).await.unwrap(),
        Revocation::Recorded
    );
    assert_eq!(
        stack.ledger.revoke(&token, expires_at).await.unwrap(),
        Revocation::AlreadyRevoked
    );

    stack.clock.advance(Duration::hours(25));
    assert!(matches!(
        stack.ledger.revoke(&token, expires_at).await,
        Err(RevocationError::AlreadyExpired)
    ));
}

#[tokio::test]
async fn token_expired_one_second_ago_fails_expired() {
    let stack = TestStack::new();
    let now = stack.clock.now().timestamp();
    let token = stack
        .codec
        .sign(&Claims {
            username: "alice".into(),
            sub: "alice".into(),
            iss: "user-backend".into(),
            iat: now - 86_400,
            exp: now - 1,
            nbf: None,
            jti: "t".into(),
        })
        .unwrap();

    assert_eq!(stack.codec.verify(&token), Err(TokenError::Expired));
}

#[tokio::test]
async fn tampered_signature_fails_invalid_signature() {
    let stack = TestStack::new();
    let token = stack.codec.issue("alice").unwrap();

    assert_eq!(
        stack.codec.verify(&tamper_signature(&token)),
        Err(TokenError::InvalidSignature)
    );
}

#[tokio::test]
async fn empty_and_garbage_are_uniform_externally() {
    let stack = TestStack::new();

    let empty = stack.authenticator.authenticate("").await.unwrap_err();
    let garbage = stack.authenticator.authenticate("not-a-jwt").await.unwrap_err();

    assert_ne!(empty.kind(), garbage.kind());
    assert_eq!(empty.public_reason(), "Authentication failed");
    assert_eq!(garbage.public_reason(), "Invalid token");
}

#[tokio::test]
async fn rotating_secret_invalidates_outstanding_tokens() {
    let stack = TestStack::new();
    let token = stack.codec.issue("alice").unwrap();

    let rotated = TokenCodec::new(&JwtSettings::new("rotated-secret-value-abcdefghijklmn").unwrap());
    assert_eq!(rotated.verify(&token), Err(TokenError::InvalidSignature));
}

#[tokio::test]
async fn hashed_keys_revoke_the_same_way() {
    let stack = TestStack::with_settings(&hashed_key_settings());
    let token = stack.authenticator.issue("alice").unwrap();

    stack.authenticator.invalidate(&token).await.unwrap();

    let err = stack.authenticator.authenticate(&token).await.unwrap_err();
    assert_eq!(err.kind(), AuthFailureKind::Revoked);
    assert!(!stack.ledger.key_for(&token).contains(&token));
}

#[tokio::test]
async fn batch_revoke_then_purge() {
    let stack = TestStack::new();
    let mut tokens = HashMap::new();
    for name in ["a", "b", "c"] {
        let token = stack.codec.issue(name).unwrap();
        let claims = stack.codec.verify(&token).unwrap();
        tokens.insert(token, claims.expires_at());
    }

    let summary = stack.ledger.batch_revoke(&tokens).await.unwrap();
    assert_eq!(summary.recorded, 3);

    for token in tokens.keys() {
        assert!(stack.authenticator.authenticate(token).await.is_err());
    }

    assert_eq!(stack.ledger.purge_all().await.unwrap(), 3);
    for token in tokens.keys() {
        assert!(stack.authenticator.authenticate(token).await.is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revoke_and_authenticate() {
    let stack = Arc::new(TestStack::new());
    let tokens: Vec<String> = (0..32)
        .map(|i| stack.codec.issue(&format!("user-{}", i)).unwrap())
        .collect();

    let mut handles = Vec::new();
    for (i, token) in tokens.iter().cloned().enumerate() {
        let stack = stack.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let _ = stack.authenticator.invalidate(&token).await;
            }
            stack.authenticator.authenticate(&token).await.is_ok()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let accepted = handle.await.unwrap();
        assert_eq!(accepted, i % 2 != 0, "token {}", i);
    }
    assert_eq!(stack.ledger.count().await.unwrap(), 16);
}

#[test]
fn codec_works_outside_async_context() {
    let codec = TokenCodec::new(&test_settings());
    let token = codec.issue("alice").unwrap();

    let stack = TestStack::new();
    let claims = tokio_test::block_on(async { stack.authenticator.authenticate(&token).await });
    assert_eq!(claims.unwrap().username, "alice");
}
