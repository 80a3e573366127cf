//! Protocol timing tunables.

use core::time::Duration;

/// How long the sender waits for an ACK before retransmitting. Also the
/// SYN re-send interval during connection establishment.
const DEFAULT_ACK_WAIT: Duration = Duration::from_millis(200);

/// Minimum spacing between liveness probes, and the quiet interval that
/// triggers one.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(1000);

/// Quiet interval after which the peer is declared dead.
const DEFAULT_DEAD_PEER_TIMEOUT: Duration = Duration::from_millis(3000);

/// Timing configuration of a [`Conn`](crate::Conn).
///
/// The protocol uses a fixed retransmission interval; there is no dynamic
/// RTO estimation. The defaults suit LAN and embedded links.
#[derive(Debug, Clone)]
pub struct Config {
    ack_wait: Duration,
    ping_interval: Duration,
    dead_peer_timeout: Duration,
}

impl Default for Config {
    #[inline(always)]
    fn default() -> Self {
        Self {
            ack_wait: DEFAULT_ACK_WAIT,
            ping_interval: DEFAULT_PING_INTERVAL,
            dead_peer_timeout: DEFAULT_DEAD_PEER_TIMEOUT,
        }
    }
}

impl Config {
    #[inline(always)]
    pub fn ack_wait(&self) -> Duration {
        self.ack_wait
    }

    pub fn with_ack_wait(mut self, value: Duration) -> Self {
        self.ack_wait = value;
        self
    }

    #[inline(always)]
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn with_ping_interval(mut self, value: Duration) -> Self {
        self.ping_interval = value;
        self
    }

    #[inline(always)]
    pub fn dead_peer_timeout(&self) -> Duration {
        self.dead_peer_timeout
    }

    /// The dead-peer threshold should comfortably exceed
    /// [`ping_interval`](Self::ping_interval), or healthy sessions will be
    /// torn down between probes.
    pub fn with_dead_peer_timeout(mut self, value: Duration) -> Self {
        self.dead_peer_timeout = value;
        self
    }
}
