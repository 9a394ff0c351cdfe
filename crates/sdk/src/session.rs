use crate::error::ClientError;
use crate::handles::Handles;
use candid::Principal;
use std::time::Duration;
use tokio::time::Instant;

/// Connection state of a [`crate::RegistrationClient`]. Both handles exist
/// together or not at all.
#[derive(Debug, Default)]
pub(crate) enum Session {
    #[default]
    Disconnected,
    Connected(ConnectedSession),
}

#[derive(Debug)]
pub(crate) struct ConnectedSession {
    pub(crate) handles: Handles,
    pub(crate) principal: Principal,
    pub(crate) expires_at: Instant,
    pub(crate) last_activity: Instant,
}

impl Session {
    pub(crate) fn connected(
        handles: Handles,
        principal: Principal,
        ttl: Duration,
    ) -> Result<Self, ClientError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| ClientError::config("session time to live is out of range"))?;
        Ok(Session::Connected(ConnectedSession {
            handles,
            principal,
            expires_at,
            last_activity: now,
        }))
    }

    pub(crate) fn principal(&self) -> Option<Principal> {
        match self {
            Session::Disconnected => None,
            Session::Connected(session) => Some(session.principal),
        }
    }

    /// Hands out the handles for one operation and records the activity.
    /// An expired or idle session is dropped.
    pub(crate) fn acquire(
        &mut self,
        now: Instant,
        idle_limit: Option<Duration>,
    ) -> Result<Handles, ClientError> {
        let error = match self {
            Session::Disconnected => return Err(ClientError::NotConnected),
            Session::Connected(session) => {
                if now >= session.expires_at {
                    ClientError::SessionExpired
                } else if idle_limit
                    .is_some_and(|limit| now.duration_since(session.last_activity) > limit)
                {
                    ClientError::IdleTimeout
                } else {
                    session.last_activity = now;
                    return Ok(session.handles.clone());
                }
            }
        };
        *self = Session::Disconnected;
        Err(error)
    }
}
