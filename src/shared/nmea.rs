// Character-at-a-time NMEA 0183 position decoder.
//
// Only the capability the tracker needs is exposed (`GpsDecoder`): feed bytes,
// then ask whether a position is known and what it is. RMC and GGA sentences
// carry positions; everything else is framed, checksummed and ignored.

const POSITION_MESSAGE_IDS: [&str; 2] = ["RMC", "GGA"];
const MAX_SENTENCE_LEN: usize = 160;

pub trait GpsDecoder {
    fn feed(&mut self, byte: u8);
    fn location_valid(&self) -> bool;
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub passed: u32,
    pub failed_checksum: u32,
    pub with_fix: u32,
}

// Once a position has been committed it stays valid; sentences without a fix
// never overwrite it.
pub struct NmeaDecoder {
    collector: SentenceCollector,
    location: Option<(f64, f64)>,
    stats: DecoderStats,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self {
            collector: SentenceCollector::new(),
            location: None,
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn commit_sentence(&mut self, sentence: &str) {
        let Some(core) = verified_core(sentence) else {
            self.stats.failed_checksum += 1;
            return;
        };
        self.stats.passed += 1;

        let fields: Vec<&str> = core.split(',').collect();
        let Some(message_id) = parse_message_id(field(&fields, 0)) else {
            return;
        };
        if !POSITION_MESSAGE_IDS.contains(&message_id) {
            return;
        }

        let position = match message_id {
            "RMC" if field(&fields, 2) == "A" => parse_lat(field(&fields, 3), field(&fields, 4))
                .zip(parse_lon(field(&fields, 5), field(&fields, 6))),
            "GGA" if !matches!(field(&fields, 6), "" | "0") => {
                parse_lat(field(&fields, 2), field(&fields, 3))
                    .zip(parse_lon(field(&fields, 4), field(&fields, 5)))
            }
            _ => None,
        };

        if let Some(position) = position {
            self.stats.with_fix += 1;
            self.location = Some(position);
        }
    }
}

impl Default for NmeaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsDecoder for NmeaDecoder {
    fn feed(&mut self, byte: u8) {
        if let Some(sentence) = self.collector.push_byte(byte) {
            self.commit_sentence(&sentence);
        }
    }

    fn location_valid(&self) -> bool {
        self.location.is_some()
    }

    fn latitude(&self) -> f64 {
        self.location.map(|(lat, _)| lat).unwrap_or_default()
    }

    fn longitude(&self) -> f64 {
        self.location.map(|(_, lon)| lon).unwrap_or_default()
    }
}

// Extract complete `$...\n` sentences from arbitrary serial bytes.
struct SentenceCollector {
    capturing: bool,
    buf: Vec<u8>,
}

impl SentenceCollector {
    fn new() -> Self {
        Self {
            capturing: false,
            buf: Vec::with_capacity(MAX_SENTENCE_LEN),
        }
    }

    fn push_byte(&mut self, byte: u8) -> Option<String> {
        if byte == b'$' {
            // Restart on every '$', a torn sentence must not swallow the next one.
            self.capturing = true;
            self.buf.clear();
            self.buf.push(byte);
            return None;
        }
        if !self.capturing {
            return None;
        }

        if byte == b'\n' {
            self.capturing = false;
            let sentence = std::str::from_utf8(&self.buf)
                .ok()
                .map(|raw| raw.trim_end_matches('\r').to_string());
            self.buf.clear();
            return sentence;
        }

        if !is_allowed_nmea_byte(byte) || self.buf.len() >= MAX_SENTENCE_LEN {
            self.capturing = false;
            self.buf.clear();
            return None;
        }

        self.buf.push(byte);
        None
    }
}

// Return the text between `$` and `*` if the trailing hex checksum matches.
fn verified_core(sentence: &str) -> Option<&str> {
    let body = sentence.strip_prefix('$')?;
    let (core, checksum) = body.split_once('*')?;
    let expected = u8::from_str_radix(checksum.get(..2)?, 16).ok()?;
    let actual = core.bytes().fold(0_u8, |acc, byte| acc ^ byte);
    (actual == expected).then_some(core)
}

fn parse_lat(value: &str, hemi: &str) -> Option<f64> {
    parse_nmea_coord(value, hemi, 2)
}

fn parse_lon(value: &str, hemi: &str) -> Option<f64> {
    parse_nmea_coord(value, hemi, 3)
}

// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed decimal degrees.
fn parse_nmea_coord(value: &str, hemi: &str, degree_digits: usize) -> Option<f64> {
    if value.len() <= degree_digits || !value.is_char_boundary(degree_digits) {
        return None;
    }

    let (deg_str, min_str) = value.split_at(degree_digits);
    let degrees = deg_str.parse::<f64>().ok()?;
    let minutes = min_str.parse::<f64>().ok()?;

    let decimal = degrees + (minutes / 60.0);
    match hemi {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

fn field<'a>(fields: &[&'a str], idx: usize) -> &'a str {
    fields.get(idx).copied().unwrap_or("")
}

fn is_allowed_nmea_byte(byte: u8) -> bool {
    byte == b'\r' || (0x20..=0x7E).contains(&byte)
}

fn parse_message_id(talker_and_id: &str) -> Option<&str> {
    if talker_and_id.len() < 3 || !talker_and_id.is_ascii() {
        return None;
    }
    Some(&talker_and_id[talker_and_id.len() - 3..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::nmea_sentence;

    fn feed_str(decoder: &mut NmeaDecoder, text: &str) {
        for byte in text.bytes() {
            decoder.feed(byte);
        }
    }

    #[test]
    fn rmc_with_active_status_commits_position() {
        let mut decoder = NmeaDecoder::new();
        feed_str(
            &mut decoder,
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        );

        assert!(decoder.location_valid());
        assert!((decoder.latitude() - 48.1173).abs() < 1e-9);
        assert!((decoder.longitude() - 11.516_666_666).abs() < 1e-6);
    }

    #[test]
    fn gga_southern_western_hemispheres_are_negative() {
        let mut decoder = NmeaDecoder::new();
        feed_str(
            &mut decoder,
            &nmea_sentence("GPGGA,101010,3345.000,S,07030.000,W,1,08,0.9,545.4,M,46.9,M,,"),
        );

        assert!(decoder.location_valid());
        assert!((decoder.latitude() + 33.75).abs() < 1e-12);
        assert!((decoder.longitude() + 70.5).abs() < 1e-12);
    }

    #[test]
    fn void_rmc_and_bad_checksum_do_not_commit() {
        let mut decoder = NmeaDecoder::new();
        feed_str(
            &mut decoder,
            &nmea_sentence("GPRMC,123519,V,4807.038,N,01131.000,E,,,230394,,"),
        );
        feed_str(
            &mut decoder,
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*00\r\n",
        );

        assert!(!decoder.location_valid());
        assert_eq!(decoder.latitude(), 0.0);
        assert_eq!(decoder.stats().failed_checksum, 1);
        assert_eq!(decoder.stats().passed, 1);
    }

    #[test]
    fn validity_is_sticky_across_fixless_sentences() {
        let mut decoder = NmeaDecoder::new();
        feed_str(&mut decoder, &nmea_sentence("GNGGA,000001,0114.0740734,N,03659.25925926,E,1,05,1.0,10.0,M,,M,,"));
        feed_str(&mut decoder, &nmea_sentence("GNGGA,000002,,,,,0,00,,,M,,M,,"));

        assert!(decoder.location_valid());
        assert!((decoder.latitude() - 1.234_567_89).abs() < 1e-12);
        assert!((decoder.longitude() - 36.987_654_321).abs() < 1e-12);
    }

    #[test]
    fn split_and_noisy_input_still_frames_sentences() {
        let mut decoder = NmeaDecoder::new();
        let sentence = nmea_sentence("GPRMC,000003,A,0130.000,N,00130.000,W,0.0,0.0,010124,,");
        let (head, tail) = sentence.split_at(20);

        feed_str(&mut decoder, "\u{1}garbage$GPGSV,torn");
        feed_str(&mut decoder, head);
        assert!(!decoder.location_valid());
        feed_str(&mut decoder, tail);

        assert!(decoder.location_valid());
        assert_eq!(decoder.latitude(), 1.5);
        assert_eq!(decoder.longitude(), -1.5);
    }
}
