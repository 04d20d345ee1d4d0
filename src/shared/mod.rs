pub mod cadence;
pub mod channel;
pub mod clock;
pub mod lock;
pub mod nmea;
pub mod signal;

#[cfg(test)]
pub mod testing;
