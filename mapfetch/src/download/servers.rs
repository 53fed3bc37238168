//! Mirror server pool.
//!
//! Tracks liveness and availability of each mirror for one download session.
//! The pool is never resized; a server that fails once is dead for good.
//!
//! ```text
//! Free --[acquire_free]--> Busy
//! Busy --[release]--> Free
//! Busy --[kill]--> Dead
//! ```

use std::fmt;

use super::error::StrategyError;

/// Index of a server slot within its [`ServerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(pub usize);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Availability of a single server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Available for a new chunk.
    Free,
    /// Serving exactly one chunk.
    Busy,
    /// Permanently excluded after a failure.
    Dead,
}

#[derive(Debug, Clone)]
struct Server {
    url: String,
    state: ServerState,
}

/// Fixed pool of interchangeable mirrors.
///
/// Duplicate URLs are allowed and treated as distinct slots, which lets a
/// caller open several concurrent connections to the same host.
#[derive(Debug, Clone)]
pub struct ServerPool {
    servers: Vec<Server>,
}

impl ServerPool {
    /// Create a pool with every server `Free`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NoServers`] if `urls` is empty.
    pub fn new(urls: Vec<String>) -> Result<Self, StrategyError> {
        if urls.is_empty() {
            return Err(StrategyError::NoServers);
        }
        let servers = urls
            .into_iter()
            .map(|url| Server {
                url,
                state: ServerState::Free,
            })
            .collect();
        Ok(Self { servers })
    }

    /// Number of server slots, dead ones included.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false: a pool cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// URL of a server slot.
    pub fn url(&self, server: ServerId) -> Option<&str> {
        self.servers.get(server.0).map(|s| s.url.as_str())
    }

    /// Current state of a server slot.
    pub fn state(&self, server: ServerId) -> Option<ServerState> {
        self.servers.get(server.0).map(|s| s.state)
    }

    /// Take the lowest-indexed free server and mark it busy.
    pub fn acquire_free(&mut self) -> Option<ServerId> {
        let index = self
            .servers
            .iter()
            .position(|s| s.state == ServerState::Free)?;
        self.servers[index].state = ServerState::Busy;
        Some(ServerId(index))
    }

    /// Return a busy server to the free list.
    pub fn release(&mut self, server: ServerId) -> Result<(), StrategyError> {
        self.transition(server, ServerState::Free, "free")
    }

    /// Permanently exclude a busy server.
    pub fn kill(&mut self, server: ServerId) -> Result<(), StrategyError> {
        self.transition(server, ServerState::Dead, "dead")
    }

    /// Number of servers that are not dead.
    pub fn alive_count(&self) -> usize {
        self.servers
            .iter()
            .filter(|s| s.state != ServerState::Dead)
            .count()
    }

    fn transition(
        &mut self,
        server: ServerId,
        next: ServerState,
        to: &'static str,
    ) -> Result<(), StrategyError> {
        let slot = self
            .servers
            .get_mut(server.0)
            .ok_or(StrategyError::NoSuchServer(server))?;
        if slot.state != ServerState::Busy {
            return Err(StrategyError::InvalidServerTransition {
                server,
                from: slot.state,
                to,
            });
        }
        slot.state = next;
        Ok(())
    }
}
