//! Frame admission: rate gating plus single-flight backpressure.

use tokio::time::{Duration, Instant};
use tracing::trace;

use crate::transport::ConnectionState;

/// Outcome of one admission test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Frame admitted; send it carrying this request token.
    Admitted { seq: u64 },
    /// Connection is not open.
    NotOpen,
    /// A previous frame is still unacknowledged.
    InFlight,
    /// The analysis interval since the last admitted frame has not elapsed.
    TooSoon,
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    seq: u64,
    sent_at: Instant,
}

/// Admission state for the capture scheduler.
///
/// A frame is admitted only when the connection is open, no frame is in
/// flight, and the analysis interval has elapsed since the previous
/// admission. A failed test suppresses the send entirely - skipped
/// frames are dropped, never queued, because analysis of a stale frame
/// has no value.
///
/// Each admission takes a fresh `seq` token; the matching response (or
/// one carrying no token at all) clears the flight. A token that
/// matches nothing is ignored, so a late duplicate cannot release a
/// newer flight. The watchdog deadline bounds how long a lost response
/// can hold the slot.
///
/// The gate is pure state over caller-supplied instants; time never
/// advances inside it.
#[derive(Debug)]
pub struct AdmissionGate {
    interval: Duration,
    watchdog: Duration,
    next_seq: u64,
    in_flight: Option<Flight>,
    last_admitted: Option<Instant>,
}

impl AdmissionGate {
    /// Create a gate with the given admission interval and watchdog budget.
    pub fn new(interval: Duration, watchdog: Duration) -> Self {
        Self { interval, watchdog, next_seq: 0, in_flight: None, last_admitted: None }
    }

    /// Test all admission clauses for a capture tick at `now`.
    ///
    /// On success the gate is immediately marked in flight and the rate
    /// clock restarted; the caller must then actually send the frame.
    pub fn try_admit(&mut self, now: Instant, state: ConnectionState) -> Admission {
        if !state.is_open() {
            return Admission::NotOpen;
        }
        if self.in_flight.is_some() {
            return Admission::InFlight;
        }
        if let Some(last) = self.last_admitted {
            if now.duration_since(last) < self.interval {
                return Admission::TooSoon;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(Flight { seq, sent_at: now });
        self.last_admitted = Some(now);
        Admission::Admitted { seq }
    }

    /// Record a response for the in-flight frame.
    ///
    /// Clears the flight when the token matches, or when the response
    /// carries no token (correlation degrades to arrival order).
    /// Returns whether the flight was cleared.
    pub fn complete(&mut self, seq: Option<u64>) -> bool {
        match (self.in_flight, seq) {
            (Some(flight), Some(token)) if flight.seq == token => {
                self.in_flight = None;
                true
            }
            (Some(flight), Some(token)) => {
                trace!(in_flight = flight.seq, token, "ignoring response for a different frame");
                false
            }
            (Some(_), None) => {
                self.in_flight = None;
                true
            }
            (None, _) => false,
        }
    }

    /// Roll back an admission whose frame was never actually sent.
    pub fn release(&mut self, seq: u64) {
        if matches!(self.in_flight, Some(flight) if flight.seq == seq) {
            self.in_flight = None;
        }
    }

    /// When the current flight must be considered lost.
    pub fn deadline(&self) -> Option<Instant> {
        self.in_flight.map(|flight| flight.sent_at + self.watchdog)
    }

    /// Reclaim the in-flight slot if the watchdog budget has elapsed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
