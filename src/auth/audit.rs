use std::sync::Mutex;

use uuid::Uuid;

/// Device context recorded against every issued refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceContext {
    pub user_agent: String,
    pub ip: String,
}

impl DeviceContext {
    pub fn new(user_agent: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip: ip.into(),
        }
    }
}

/// Security-relevant outcomes. Carries identifiers and device data only,
/// never secrets or password material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    LoginSucceeded {
        user_id: i64,
        device: DeviceContext,
    },
    LoginFailed {
        username: String,
        device: DeviceContext,
    },
    MalformedPasswordHash {
        user_id: i64,
    },
    RefreshRotated {
        user_id: i64,
        old_jti: Uuid,
        new_jti: Uuid,
        device: DeviceContext,
    },
    RefreshReuseDetected {
        user_id: i64,
        jti: Uuid,
        device: DeviceContext,
        sessions_revoked: u64,
    },
    RefreshSecretMismatch {
        user_id: i64,
        jti: Uuid,
        device: DeviceContext,
    },
    RefreshStoreDetached {
        user_id: i64,
        jti: Uuid,
    },
    SessionsRevoked {
        user_id: i64,
        count: u64,
    },
}

/// Side channel for security events; injected into the session service.
pub trait SecurityLog: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Forwards events to `tracing` under the `security` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSecurityLog;

impl SecurityLog for TracingSecurityLog {
    fn record(&self, event: SecurityEvent) {
        match event {
            SecurityEvent::LoginSucceeded { user_id, device } => tracing::info!(
                target: "security",
                user_id,
                user_agent = %device.user_agent,
                ip = %device.ip,
                "login succeeded"
            ),
            SecurityEvent::LoginFailed { username, device } => tracing::warn!(
                target: "security",
                %username,
                user_agent = %device.user_agent,
                ip = %device.ip,
                "login failed"
            ),
            SecurityEvent::MalformedPasswordHash { user_id } => tracing::error!(
                target: "security",
                user_id,
                "stored password hash could not be parsed"
            ),
            SecurityEvent::RefreshRotated {
                user_id,
                old_jti,
                new_jti,
                device,
            } => tracing::info!(
                target: "security",
                user_id,
                %old_jti,
                %new_jti,
                user_agent = %device.user_agent,
                ip = %device.ip,
                "refresh token rotated"
            ),
            SecurityEvent::RefreshReuseDetected {
                user_id,
                jti,
                device,
                sessions_revoked,
            } => tracing::warn!(
                target: "security",
                user_id,
                %jti,
                user_agent = %device.user_agent,
                ip = %device.ip,
                sessions_revoked,
                "dead refresh token presented; revoked every session of the user"
            ),
            SecurityEvent::RefreshSecretMismatch {
                user_id,
                jti,
                device,
            } => tracing::warn!(
                target: "security",
                user_id,
                %jti,
                user_agent = %device.user_agent,
                ip = %device.ip,
                "refresh secret mismatch"
            ),
            SecurityEvent::RefreshStoreDetached { user_id, jti } => tracing::warn!(
                target: "security",
                user_id,
                %jti,
                "refresh store not wired up; issued refresh token is not persisted"
            ),
            SecurityEvent::SessionsRevoked { user_id, count } => tracing::info!(
                target: "security",
                user_id,
                count,
                "all sessions revoked"
            ),
        }
    }
}

/// Keeps every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySecurityLog {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemorySecurityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SecurityLog for MemorySecurityLog {
    fn record(&self, event: SecurityEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
