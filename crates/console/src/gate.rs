/// Single-flight guard for one polled stream.
///
/// `begin` hands out a token and refuses to issue another until the holder
/// calls `complete` or the gate is cancelled. A response that comes back
/// carrying a token the gate no longer recognizes belongs to a superseded
/// fetch and must be dropped without touching the model.
#[derive(Debug)]
pub(crate) struct FetchGate {
    epoch: u64,
    in_flight: Option<FetchToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FetchToken(u64);

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct GateBusy;

impl FetchGate {
    pub(crate) fn new() -> Self {
        Self {
            epoch: 0,
            in_flight: None,
        }
    }

    pub(crate) fn begin(&mut self) -> Result<FetchToken, GateBusy> {
        if self.in_flight.is_some() {
            return Err(GateBusy);
        }
        self.epoch += 1;
        let token = FetchToken(self.epoch);
        self.in_flight = Some(token);
        Ok(token)
    }

    /// True if `token` is the fetch currently outstanding on this gate.
    pub(crate) fn is_current(&self, token: FetchToken) -> bool {
        self.in_flight == Some(token)
    }

    /// Clears the outstanding fetch. Returns false for a token that was
    /// already superseded, in which case the caller must discard the
    /// response it is holding.
    pub(crate) fn complete(&mut self, token: FetchToken) -> bool {
        if self.is_current(token) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Invalidates the outstanding token, if any. The gate is immediately
    /// free for a new `begin`; the cancelled fetch's response will fail the
    /// token comparison when it eventually arrives.
    pub(crate) fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub(crate) fn busy(&self) -> bool {
        self.in_flight.is_some()
    }
}
