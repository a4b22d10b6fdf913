use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::{
    auth::{AccessClaims, DeviceContext},
    error::AppError,
    state::AppState,
};

const UNKNOWN_IP: &str = "unknown";

/// Bearer access token, verified against the session service's signer.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub claims: AccessClaims,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>().cloned() {
            return Ok(user);
        }

        let auth = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        let token = auth
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Missing/invalid Authorization header"))?;

        let claims = state.sessions.verify_access(token.trim())?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        let user = AuthUser { user_id, claims };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// User agent and client address of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDevice(pub DeviceContext);

impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let ip = client_ip(&parts.headers, peer);

        Ok(Self(DeviceContext::new(user_agent, ip)))
    }
}

impl From<ClientDevice> for DeviceContext {
    fn from(device: ClientDevice) -> Self {
        device.0
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<String>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.unwrap_or_else(|| UNKNOWN_IP.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_wins_and_takes_first_hop() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.9 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);

        assert_eq!(
            client_ip(&map, Some("127.0.0.1".to_string())),
            "203.0.113.9"
        );
    }

    #[test]
    fn real_ip_used_without_forwarded_for() {
        let map = headers(&[("x-real-ip", "198.51.100.2")]);

        assert_eq!(client_ip(&map, None), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        assert_eq!(
            client_ip(&HeaderMap::new(), Some("127.0.0.1".to_string())),
            "127.0.0.1"
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), UNKNOWN_IP);
    }
}
