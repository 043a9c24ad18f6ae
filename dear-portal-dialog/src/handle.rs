//! Request handles: token minting, predicted object paths and the match rule
//! that routes a request's `Response` signal to us.
//!
//! The portal creates one `Request` object per call at
//! `/org/freedesktop/portal/desktop/request/<sender>/<token>`. We predict that
//! path from our own unique name and a random token and subscribe to it before
//! sending the call, so a reply that arrives before the call returns is not
//! lost. Older portals ignore the token; in that case the path returned by the
//! call wins and the subscription is moved.

use std::fmt;

use crate::error::PortalResult;
use crate::transport::{PORTAL_DESTINATION, REQUEST_INTERFACE, RESPONSE_MEMBER, Transport};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Prefix shared by every request object path.
pub const REQUEST_PATH_PREFIX: &str = "/org/freedesktop/portal/desktop/request/";
/// Length of a handle token in characters.
pub const TOKEN_LEN: usize = 64;

const RANDOM_CHUNK: usize = 8;

/// Generate a fresh handle token.
///
/// 32 random bytes, each written as two letters from `A..=P` (low nibble
/// first). If the system random source fails part way, the token keeps the
/// letters produced so far; it is shorter but still usable.
pub fn generate_token() -> String {
    token_from_source(getrandom::fill)
}

fn token_from_source<E>(mut fill: impl FnMut(&mut [u8]) -> Result<(), E>) -> String {
    let mut token = String::with_capacity(TOKEN_LEN);
    let mut chunk = [0u8; RANDOM_CHUNK];
    for _ in 0..TOKEN_LEN / 2 / RANDOM_CHUNK {
        if fill(&mut chunk).is_err() {
            #[cfg(feature = "tracing")]
            warn!(
                "Random source failed, using a {}-character request token",
                token.len()
            );
            break;
        }
        for b in chunk {
            token.push(char::from(b'A' + (b & 15)));
            token.push(char::from(b'A' + (b >> 4)));
        }
    }
    token
}

/// Predicted request object path for a connection and token.
///
/// The unique name loses its leading `:` and has every `.` replaced with `_`.
pub fn request_object_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.strip_prefix(':').unwrap_or(unique_name);
    let mut path =
        String::with_capacity(REQUEST_PATH_PREFIX.len() + sender.len() + 1 + token.len());
    path.push_str(REQUEST_PATH_PREFIX);
    path.extend(sender.chars().map(|c| if c == '.' { '_' } else { c }));
    path.push('/');
    path.push_str(token);
    path
}

/// Bus match rule selecting the `Response` signal of one request object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRule {
    /// Request object path
    pub path: String,
    /// Our unique name
    pub destination: String,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type='signal',sender='{PORTAL_DESTINATION}',path='{}',interface='{REQUEST_INTERFACE}',member='{RESPONSE_MEMBER}',destination='{}'",
            self.path, self.destination
        )
    }
}

/// Token, live object path and subscription state of one request.
#[derive(Debug)]
pub struct CorrelationHandle {
    token: String,
    unique_name: String,
    object_path: String,
    subscribed: bool,
}

impl CorrelationHandle {
    /// Mint a handle with a fresh token for the connection `unique_name`.
    pub fn mint(unique_name: &str) -> Self {
        Self::with_token(unique_name, generate_token())
    }

    /// Build a handle around a known token.
    pub fn with_token(unique_name: &str, token: String) -> Self {
        let object_path = request_object_path(unique_name, &token);
        Self {
            token,
            unique_name: unique_name.to_owned(),
            object_path,
            subscribed: false,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Object path the `Response` signal is expected on.
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Match rule for the current object path.
    pub fn match_rule(&self) -> MatchRule {
        MatchRule {
            path: self.object_path.clone(),
            destination: self.unique_name.clone(),
        }
    }

    /// Install the match rule for the current object path.
    pub fn subscribe<T: Transport + ?Sized>(&mut self, transport: &mut T) -> PortalResult<()> {
        transport.add_match(&self.match_rule())?;
        self.subscribed = true;
        #[cfg(feature = "tracing")]
        debug!("Subscribed to {}", self.object_path);
        Ok(())
    }

    /// Adopt the object path returned by the portal.
    ///
    /// When it differs from the predicted one, the old rule is removed and a
    /// new one installed. Returns whether the path changed.
    pub fn reconcile<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        returned_path: &str,
    ) -> PortalResult<bool> {
        if returned_path == self.object_path {
            return Ok(false);
        }
        #[cfg(feature = "tracing")]
        debug!(
            "Portal ignored the handle token, moving subscription from {} to {}",
            self.object_path, returned_path
        );
        if self.subscribed {
            self.subscribed = false;
            transport.remove_match(&self.match_rule())?;
        }
        self.object_path = returned_path.to_owned();
        self.subscribe(transport)?;
        Ok(true)
    }

    /// Remove the match rule, if installed. Failures are only logged.
    pub fn unsubscribe<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if !self.subscribed {
            return;
        }
        self.subscribed = false;
        match transport.remove_match(&self.match_rule()) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                debug!("Unsubscribed from {}", self.object_path);
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!("Failed to remove match for {}: {}", self.object_path, _err);
            }
        }
    }
}
