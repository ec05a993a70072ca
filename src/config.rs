//! Server configuration.

/// Listen address used when none is given.
pub const DEFAULT_LISTEN_ADDR: &str = ":5001";

/// Capacity of the envelope queue in front of the serializer.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Settings consumed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind. Accepts `host:port` or a bare `:port`, which binds
    /// every interface.
    pub listen_addr: String,

    /// Number of envelopes that may wait for the serializer before a
    /// connection's send blocks. At least 1.
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        if !addr.is_empty() {
            self.listen_addr = addr;
        }
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// The address in a form `TcpListener::bind` accepts.
    ///
    /// ```
    /// use keyline::ServerConfig;
    /// assert_eq!(ServerConfig::default().bind_address(), "0.0.0.0:5001");
    /// assert_eq!(
    ///     ServerConfig::new().listen_addr("127.0.0.1:6380").bind_address(),
    ///     "127.0.0.1:6380"
    /// );
    /// ```
    pub fn bind_address(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }
}
