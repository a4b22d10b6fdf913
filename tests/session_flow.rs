use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use futures_util::future::join_all;

use session_auth::{
    auth::{
        AuthError, CredentialHasher, DeviceContext, RefreshToken, RefreshTokenStore,
        RequestContext, SecurityEvent, TokenSigner,
        audit::MemorySecurityLog,
        clock::ManualClock,
    },
    config::HashConfig,
    db::MemoryStore,
    services::SessionService,
};

struct Harness {
    service: SessionService,
    store: MemoryStore,
    clock: Arc<ManualClock>,
    log: Arc<MemorySecurityLog>,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("timestamp should be valid"),
    ));
    let log = Arc::new(MemorySecurityLog::new());
    let hasher = CredentialHasher::new(&HashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("hasher should build");
    let signer = TokenSigner::new("flow-secret", "auth.flow", Duration::from_secs(600))
        .expect("signer should build");

    let service = SessionService::builder(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        hasher,
        signer,
    )
    .clock(clock.clone())
    .security_log(log.clone())
    .refresh_ttl(Duration::from_secs(7 * 24 * 60 * 60))
    .build()
    .expect("service should build");

    Harness {
        service,
        store,
        clock,
        log,
    }
}

fn device() -> DeviceContext {
    DeviceContext::new("flow-test/1.0", "192.0.2.10")
}

#[tokio::test]
async fn alice_scenario() {
    let h = harness();
    let ctx = RequestContext::background();

    h.service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create alice");
    let login = h
        .service
        .login(&ctx, "ALICE", "s3cret!", device())
        .await
        .expect("case-insensitive login");
    let r0 = login.tokens.refresh;

    let r1 = h
        .service
        .refresh(&ctx, &r0, device())
        .await
        .expect("first refresh")
        .tokens
        .refresh;
    assert_ne!(r0, r1);

    let replay = h
        .service
        .refresh(&ctx, &r0, device())
        .await
        .expect_err("replayed token");
    assert_eq!(replay, AuthError::InvalidToken);
    assert!(h.log.events().iter().any(|event| matches!(
        event,
        SecurityEvent::RefreshReuseDetected { sessions_revoked: 1, .. }
    )));
}

#[tokio::test]
async fn refresh_succeeds_on_current_token_without_replay() {
    let h = harness();
    let ctx = RequestContext::background();
    h.service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create");
    let r0 = h
        .service
        .login(&ctx, "alice", "s3cret!", device())
        .await
        .expect("login")
        .tokens
        .refresh;

    let r1 = h
        .service
        .refresh(&ctx, &r0, device())
        .await
        .expect("r0")
        .tokens
        .refresh;
    let session = h
        .service
        .refresh(&ctx, &r1, DeviceContext::new("other-agent", "198.51.100.1"))
        .await
        .expect("r1");

    let jti = session
        .tokens
        .refresh
        .parse::<RefreshToken>()
        .expect("wire format")
        .jti;
    let record = h.store.find_by_jti(jti).await.expect("record");
    assert_eq!(record.user_agent, "other-agent");
    assert_eq!(record.ip, "198.51.100.1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_rotates_exactly_once() {
    let h = harness();
    let ctx = RequestContext::background();
    let user = h
        .service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create");
    let token = h
        .service
        .login(&ctx, "alice", "s3cret!", device())
        .await
        .expect("login")
        .tokens
        .refresh;

    let attempts = (0..8).map(|_| {
        let service = h.service.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::background();
            service.refresh(&ctx, &token, device()).await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|err| *err == AuthError::InvalidToken)
    );

    // every loser observed the winner's rotation, so its family revocation
    // also caught the winner's freshly issued session
    let reuse_events = h
        .log
        .events()
        .iter()
        .filter(|event| matches!(event, SecurityEvent::RefreshReuseDetected { .. }))
        .count();
    assert_eq!(reuse_events, 7);
    let records = h.store.refresh_tokens_for(user.id);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.revoked));

    let winner = results
        .into_iter()
        .find_map(Result::ok)
        .expect("one refresh should win");
    let err = h
        .service
        .refresh(&ctx, &winner.tokens.refresh, device())
        .await
        .expect_err("winner was revoked by the theft response");
    assert_eq!(err, AuthError::InvalidToken);
}

#[tokio::test]
async fn refresh_token_expires_after_ttl() {
    let h = harness();
    let ctx = RequestContext::background();
    let user = h
        .service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create");
    let token = h
        .service
        .login(&ctx, "alice", "s3cret!", device())
        .await
        .expect("login")
        .tokens
        .refresh;

    h.clock.advance(chrono::Duration::days(7));

    let err = h
        .service
        .refresh(&ctx, &token, device())
        .await
        .expect_err("expired at exactly the ttl");
    assert_eq!(err, AuthError::InvalidToken);
    assert!(h.log.events().iter().any(|event| matches!(
        event,
        SecurityEvent::RefreshReuseDetected { user_id, .. } if *user_id == user.id
    )));
}

#[tokio::test]
async fn access_token_expires_with_clock() {
    let h = harness();
    let ctx = RequestContext::background();
    h.service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create");
    let access = h
        .service
        .login(&ctx, "alice", "s3cret!", device())
        .await
        .expect("login")
        .tokens
        .access;

    h.service
        .verify_access(&access)
        .expect("fresh token verifies");
    h.clock.advance(chrono::Duration::seconds(601));

    assert_eq!(
        h.service.verify_access(&access).expect_err("stale token"),
        AuthError::InvalidToken
    );
}

#[tokio::test]
async fn logout_twice_leaves_token_revoked() {
    let h = harness();
    let ctx = RequestContext::background();
    h.service
        .create_user(&ctx, "alice", "s3cret!")
        .await
        .expect("create");
    let token = h
        .service
        .login(&ctx, "alice", "s3cret!", device())
        .await
        .expect("login")
        .tokens
        .refresh;
    let jti = token.parse::<RefreshToken>().expect("wire format").jti;

    for _ in 0..2 {
        h.service
            .logout(&ctx, &token, device())
            .await
            .expect("logout should not fail");
        assert!(h.store.find_by_jti(jti).await.expect("record").revoked);
    }
}
