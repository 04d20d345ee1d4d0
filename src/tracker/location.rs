use crate::error::{Fault, LinkResult};
use crate::shared::nmea::GpsDecoder;
use tracing::{debug, info};

// A decoded position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            valid: true,
        }
    }

    // Exact bitwise-value comparison of the coordinates, no tolerance.
    pub fn same_position(&self, other: &Fix) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

// Tracker bookkeeping, lent read-only to the diagnostics pages.
// `last_accepted` trails `last_reported`: it is only caught up on an
// evaluation that found no change, so right after an upload it still holds
// the position the device moved away from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerState {
    pub current: Fix,
    pub last_accepted: Fix,
    pub last_reported: Fix,
    pub updated: bool,
}

// Sink for positions that changed. Called synchronously from `ingest`.
pub trait Publish {
    fn publish(&mut self, fix: Fix) -> LinkResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub state: TrackerState,
    pub fault: Option<Fault>,
}

pub struct LocationTracker<D> {
    decoder: D,
    state: TrackerState,
}

impl<D: GpsDecoder> LocationTracker<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            state: TrackerState::default(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    // Decode `frame`, then decide whether the position moved.
    // Any difference in either coordinate, down to the last bit, counts as a
    // move and is handed to `publisher` before returning. The reported
    // baseline is advanced before publishing, so a failed upload is dropped
    // rather than retried on the next frame.
    pub fn ingest<P: Publish + ?Sized>(
        &mut self,
        frame: &[u8],
        publisher: &mut P,
    ) -> LinkResult<Evaluation> {
        for &byte in frame {
            self.decoder.feed(byte);
        }

        let fault = if self.decoder.location_valid() {
            self.state.current = Fix::new(self.decoder.latitude(), self.decoder.longitude());
            debug!(
                "Latitude= {:.9} Longitude= {:.9}",
                self.state.current.latitude, self.state.current.longitude
            );
            None
        } else {
            Some(Fault::InvalidFix)
        };

        self.state.updated = !self.state.current.same_position(&self.state.last_reported);
        if self.state.updated {
            self.state.last_reported = self.state.current;
            info!(
                "Location Updated to: Latitude= {:.9} Longitude= {:.9}",
                self.state.last_reported.latitude, self.state.last_reported.longitude
            );
            publisher.publish(self.state.last_reported)?;
        } else {
            self.state.last_accepted = self.state.last_reported;
        }

        Ok(Evaluation {
            state: self.state,
            fault,
        })
    }
}
