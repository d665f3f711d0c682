//! Server configuration

/// Feedme server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a fresh connection may take to complete a version-compatible
    /// handshake before being disconnected, in milliseconds. 0 disables the
    /// timeout.
    pub handshake_ms: u64,
    /// How long a terminated feed entry lingers (so late FeedClose messages
    /// still succeed quietly) before being forgotten, in milliseconds.
    /// 0 keeps terminated entries until the client acts or disconnects.
    pub termination_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_ms: 30_000,
            termination_ms: 29_000,
        }
    }
}

impl ServerConfig {
    pub fn handshake_ms(mut self, ms: u64) -> Self {
        self.handshake_ms = ms;
        self
    }

    pub fn termination_ms(mut self, ms: u64) -> Self {
        self.termination_ms = ms;
        self
    }
}
