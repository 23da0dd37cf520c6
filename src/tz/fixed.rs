/*!
Time zones of a single constant offset.

Fixed-offset zones are synthesized rather than loaded: the canonical name
for a non-zero offset is `Fixed/UTC±HH:MM:SS`, and a zero offset is just
`UTC`. The registry recognizes those names so that a fixed zone can be
round-tripped through its name.
*/

use alloc::string::String;

use crate::civil::CivilSecond;

/// The prefix used for the names of fixed-offset zones.
const FIXED_OFFSET_PREFIX: &str = "Fixed/";

/// Offsets beyond 24 hours from UTC collapse to UTC. Keeping the bound
/// tight limits the number of distinct zone names and keeps the rendered
/// names two digits wide.
const MAX_FIXED_OFFSET: i32 = 24 * 60 * 60;

/// A time zone that applies one UTC offset for all time.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct FixedZone {
    offset: i32,
    name: String,
    abbr: String,
}

impl FixedZone {
    /// Creates a fixed zone for the given UTC offset in seconds.
    ///
    /// Offsets outside `[-86400, 86400]` collapse to UTC.
    pub(crate) fn new(offset: i32) -> FixedZone {
        let offset = if offset.unsigned_abs() > MAX_FIXED_OFFSET as u32 {
            0
        } else {
            offset
        };
        let name = name_from_offset(offset);
        let abbr = abbr_from_offset(offset);
        FixedZone { offset, name, abbr }
    }

    pub(crate) fn offset(&self) -> i32 {
        self.offset
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn abbreviation(&self) -> &str {
        &self.abbr
    }

    /// The civil time this zone displays at the given Unix second.
    pub(crate) fn to_civil(&self, unix: i64) -> CivilSecond {
        CivilSecond::from_seconds_from_epoch(unix + i64::from(self.offset))
    }

    /// The Unix second at which this zone displays the given civil time.
    pub(crate) fn to_unix(&self, cs: CivilSecond) -> i64 {
        cs.seconds_from_epoch() - i64::from(self.offset)
    }
}

/// Recovers the offset from a fixed zone name produced by
/// `name_from_offset`. `"UTC"` maps to zero. Returns `None` for any other
/// shape of name, which the registry treats as a file-backed zone name.
pub(crate) fn offset_from_name(name: &str) -> Option<i32> {
    if name == "UTC" {
        return Some(0);
    }
    let rest = name.strip_prefix(FIXED_OFFSET_PREFIX)?;
    let rest = rest.strip_prefix("UTC")?;
    // `±HH:MM:SS` exactly.
    let bytes = rest.as_bytes();
    if bytes.len() != 9 {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    if bytes[3] != b':' || bytes[6] != b':' {
        return None;
    }
    let hours = parse2d(&bytes[1..3])?;
    let minutes = parse2d(&bytes[4..6])?;
    let seconds = parse2d(&bytes[7..9])?;
    let total = ((hours * 60) + minutes) * 60 + seconds;
    if total > MAX_FIXED_OFFSET {
        return None;
    }
    Some(sign * total)
}

fn parse2d(bytes: &[u8]) -> Option<i32> {
    if !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() {
        return None;
    }
    Some(i32::from(bytes[0] - b'0') * 10 + i32::from(bytes[1] - b'0'))
}

fn name_from_offset(offset: i32) -> String {
    if offset == 0 {
        return String::from("UTC");
    }
    let sign = if offset < 0 { '-' } else { '+' };
    let off = offset.unsigned_abs();
    let (hours, minutes, seconds) =
        (off / 3600, (off % 3600) / 60, off % 60);
    alloc::format!(
        "{FIXED_OFFSET_PREFIX}UTC{sign}{hours:02}:{minutes:02}:{seconds:02}"
    )
}

/// The abbreviation is the name without the `Fixed/` prefix and with
/// trailing zero fields elided down to hour granularity: `UTC+05`,
/// `UTC+05:30`, `UTC+05:30:07`.
fn abbr_from_offset(offset: i32) -> String {
    if offset == 0 {
        return String::from("UTC");
    }
    let sign = if offset < 0 { '-' } else { '+' };
    let off = offset.unsigned_abs();
    let (hours, minutes, seconds) =
        (off / 3600, (off % 3600) / 60, off % 60);
    if seconds != 0 {
        alloc::format!("UTC{sign}{hours:02}:{minutes:02}:{seconds:02}")
    } else if minutes != 0 {
        alloc::format!("UTC{sign}{hours:02}:{minutes:02}")
    } else {
        alloc::format!("UTC{sign}{hours:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_is_utc() {
        let zone = FixedZone::new(0);
        assert_eq!(zone.name(), "UTC");
        assert_eq!(zone.abbreviation(), "UTC");
        assert_eq!(zone.offset(), 0);
    }

    #[test]
    fn name_synthesis() {
        assert_eq!(FixedZone::new(5 * 3600).name(), "Fixed/UTC+05:00:00");
        assert_eq!(
            FixedZone::new(-(5 * 3600 + 30 * 60)).name(),
            "Fixed/UTC-05:30:00",
        );
        assert_eq!(FixedZone::new(93).name(), "Fixed/UTC+00:01:33");
    }

    #[test]
    fn abbreviation_elision() {
        assert_eq!(FixedZone::new(5 * 3600).abbreviation(), "UTC+05");
        assert_eq!(
            FixedZone::new(5 * 3600 + 30 * 60).abbreviation(),
            "UTC+05:30",
        );
        assert_eq!(
            FixedZone::new(-(5 * 3600 + 30 * 60 + 7)).abbreviation(),
            "UTC-05:30:07",
        );
        assert_eq!(FixedZone::new(-3600).abbreviation(), "UTC-01");
    }

    #[test]
    fn out_of_range_collapses_to_utc() {
        assert_eq!(FixedZone::new(MAX_FIXED_OFFSET + 1).name(), "UTC");
        assert_eq!(FixedZone::new(-MAX_FIXED_OFFSET - 1).name(), "UTC");
        // The boundary itself is accepted.
        assert_eq!(
            FixedZone::new(MAX_FIXED_OFFSET).name(),
            "Fixed/UTC+24:00:00",
        );
    }

    #[test]
    fn name_round_trips() {
        for &offset in
            &[0, 1, -1, 93, 5 * 3600, -(5 * 3600 + 30 * 60), MAX_FIXED_OFFSET]
        {
            let zone = FixedZone::new(offset);
            assert_eq!(
                offset_from_name(zone.name()),
                Some(offset),
                "offset {offset} via name {}",
                zone.name(),
            );
        }
        assert_eq!(offset_from_name("America/New_York"), None);
        assert_eq!(offset_from_name("Fixed/UTC+05:00"), None);
        assert_eq!(offset_from_name("Fixed/UTC 05:00:00"), None);
    }

    #[test]
    fn civil_conversion() {
        let zone = FixedZone::new(-8 * 3600);
        let cs = zone.to_civil(0);
        assert_eq!(cs, CivilSecond::new(1969, 12, 31, 16, 0, 0));
        assert_eq!(zone.to_unix(cs), 0);
    }
}
