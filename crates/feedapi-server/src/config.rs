use std::time::Duration;

/// Default number of frames buffered between the engine and the socket.
pub const DEFAULT_STREAM_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Frames queued ahead of the response body before the engine blocks.
    pub stream_buffer: usize,
    /// Deadline applied to every fetch; `None` disables it.
    pub fetch_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            stream_buffer: DEFAULT_STREAM_BUFFER,
            fetch_timeout: None,
        }
    }
}
