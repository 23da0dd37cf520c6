/*!
A parser for the POSIX `TZ`-style rule string found at the end of v2+
TZif files.

The grammar parsed here is `std offset [dst [offset] , rule , rule]`,
where each `rule` is one of `Jn`, `n` or `Mm.w.d`, optionally followed by
`/time`. The time-of-day permits the common `[+-]hh` extension with hours
up to 167, and abbreviations may be quoted between `<` and `>`.

Note the POSIX sign convention: the string records the value added to
local time to reach UTC, which is the negation of the UTC offset stored
everywhere else in this crate. The parser performs that negation, so a
parsed `PosixTimeZone` always holds conventional UTC offsets.
*/

use alloc::string::String;

use crate::error::{err, Error};

/// A parsed POSIX time zone rule.
///
/// This is only an input to transition synthesis (see `tz::tzif`); it is
/// not itself queried at lookup time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PosixTimeZone {
    /// The standard time abbreviation, e.g. `PST`.
    pub(crate) std_abbr: String,
    /// The standard time UTC offset in seconds (sign already corrected).
    pub(crate) std_offset: i32,
    /// The DST regime, when the string describes one.
    pub(crate) dst: Option<PosixDst>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PosixDst {
    /// The DST abbreviation, e.g. `PDT`.
    pub(crate) abbr: String,
    /// The DST UTC offset in seconds. Defaults to one hour ahead of
    /// standard time when the string does not spell it out.
    pub(crate) offset: i32,
    /// The year-relative instant at which DST begins.
    pub(crate) start: PosixTransition,
    /// The year-relative instant at which DST ends.
    pub(crate) end: PosixTransition,
}

/// A year-relative transition: a date rule plus a local time of day.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PosixTransition {
    pub(crate) date: TransitionDate,
    /// Seconds after the local midnight of the rule date at which the
    /// transition occurs. Defaults to 02:00:00. May be negative or exceed
    /// one day per the common `[+-]hh` extension.
    pub(crate) time_offset: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TransitionDate {
    /// `Jn`: the n'th day of the year in `[1, 365]`, never counting
    /// February 29.
    Julian { day: i16 },
    /// `n`: the zero-based day of the year in `[0, 365]`, counting
    /// February 29 in leap years.
    Ordinal { day: i16 },
    /// `Mm.w.d`: the w'th occurrence (`5` meaning last) of weekday `d`
    /// (`0` is Sunday) in month `m`.
    WeekdayOfMonth { month: i8, week: i8, weekday: i8 },
}

const DEFAULT_RULE_TIME: i32 = 2 * 60 * 60;

impl PosixTimeZone {
    /// Parses a POSIX TZ rule string.
    ///
    /// Errors on a leading `:` (implementation-defined strings are not
    /// rules), on any out-of-range or overflowing integer, and on
    /// anything left over after the grammar is consumed.
    pub(crate) fn parse(bytes: &[u8]) -> Result<PosixTimeZone, Error> {
        let mut p = Parser::new(bytes);
        if p.peek() == Some(b':') {
            return Err(err!(
                "POSIX TZ string begins with ':', which names an \
                 implementation-defined zone rather than a rule",
            ));
        }

        let std_abbr = p.parse_abbr()?;
        let std_offset = p.parse_offset(0, 24, -1)?;
        if p.is_done() {
            return Ok(PosixTimeZone { std_abbr, std_offset, dst: None });
        }

        let abbr = p.parse_abbr()?;
        let offset = if p.peek() == Some(b',') {
            // One hour ahead of standard time unless spelled out.
            std_offset + 60 * 60
        } else {
            p.parse_offset(0, 24, -1)?
        };
        let start = p.parse_transition()?;
        let end = p.parse_transition()?;
        if !p.is_done() {
            return Err(err!(
                "unparsed input remains after POSIX TZ transition rules",
            ));
        }
        Ok(PosixTimeZone {
            std_abbr,
            std_offset,
            dst: Some(PosixDst { abbr, offset, start, end }),
        })
    }
}

/// A hand-written descent over a bounded byte range.
struct Parser<'s> {
    bytes: &'s [u8],
}

impl<'s> Parser<'s> {
    fn new(bytes: &'s [u8]) -> Parser<'s> {
        Parser { bytes }
    }

    fn is_done(&self) -> bool {
        self.bytes.is_empty()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    fn consume_prefix(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.bytes = &self.bytes[1..];
            true
        } else {
            false
        }
    }

    /// Parses a decimal integer in `[min, max]`. At least one digit is
    /// required and accumulation is checked, so `999999999999` is an
    /// error rather than a wrap.
    fn parse_int(&mut self, min: i32, max: i32) -> Result<i32, Error> {
        let mut value: i32 = 0;
        let mut digits = 0;
        while let Some(byte) = self.peek() {
            if !byte.is_ascii_digit() {
                break;
            }
            let d = i32::from(byte - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(d))
                .ok_or_else(|| {
                    err!("integer in POSIX TZ string overflows")
                })?;
            digits += 1;
            self.bytes = &self.bytes[1..];
        }
        if digits == 0 {
            return Err(err!("expected integer in POSIX TZ string"));
        }
        if value < min || max < value {
            return Err(err!(
                "integer {value} in POSIX TZ string is not in \
                 the range {min}..={max}",
            ));
        }
        Ok(value)
    }

    /// abbr = `<.*?>` | `[^-+,0-9]{3,}`
    fn parse_abbr(&mut self) -> Result<String, Error> {
        if self.consume_prefix(b'<') {
            let end = self
                .bytes
                .iter()
                .position(|&b| b == b'>')
                .ok_or_else(|| {
                    err!("unclosed '<' in POSIX TZ abbreviation")
                })?;
            let abbr = core::str::from_utf8(&self.bytes[..end])
                .map_err(|_| err!("POSIX TZ abbreviation is not UTF-8"))?;
            let abbr = String::from(abbr);
            self.bytes = &self.bytes[end + 1..];
            return Ok(abbr);
        }
        let end = self
            .bytes
            .iter()
            .position(|&b| matches!(b, b'-' | b'+' | b',' | b'0'..=b'9'))
            .unwrap_or(self.bytes.len());
        if end < 3 {
            return Err(err!(
                "POSIX TZ abbreviation must have at least 3 characters",
            ));
        }
        let abbr = core::str::from_utf8(&self.bytes[..end])
            .map_err(|_| err!("POSIX TZ abbreviation is not UTF-8"))?;
        let abbr = String::from(abbr);
        self.bytes = &self.bytes[end..];
        Ok(abbr)
    }

    /// offset = `[+|-]hh[:mm[:ss]]`, aggregated into seconds.
    ///
    /// `sign` is `-1` when parsing a zone offset (POSIX stores those with
    /// the sign reversed) and `1` when parsing a rule's time of day.
    fn parse_offset(
        &mut self,
        min_hour: i32,
        max_hour: i32,
        sign: i32,
    ) -> Result<i32, Error> {
        let mut sign = sign;
        if self.consume_prefix(b'-') {
            sign = -sign;
        } else {
            self.consume_prefix(b'+');
        }
        let hours = self.parse_int(min_hour, max_hour)?;
        let mut minutes = 0;
        let mut seconds = 0;
        if self.consume_prefix(b':') {
            minutes = self.parse_int(0, 59)?;
            if self.consume_prefix(b':') {
                seconds = self.parse_int(0, 59)?;
            }
        }
        Ok(sign * (((hours * 60) + minutes) * 60 + seconds))
    }

    /// transition = `,` ( `Jn` | `n` | `Mm.w.d` ) [ `/` offset ]
    fn parse_transition(&mut self) -> Result<PosixTransition, Error> {
        if !self.consume_prefix(b',') {
            return Err(err!(
                "expected ',' before POSIX TZ transition rule",
            ));
        }
        let date = if self.consume_prefix(b'M') {
            let month = self.parse_int(1, 12)? as i8;
            if !self.consume_prefix(b'.') {
                return Err(err!("expected '.' after month in M rule"));
            }
            let week = self.parse_int(1, 5)? as i8;
            if !self.consume_prefix(b'.') {
                return Err(err!("expected '.' after week in M rule"));
            }
            let weekday = self.parse_int(0, 6)? as i8;
            TransitionDate::WeekdayOfMonth { month, week, weekday }
        } else if self.consume_prefix(b'J') {
            TransitionDate::Julian { day: self.parse_int(1, 365)? as i16 }
        } else {
            TransitionDate::Ordinal { day: self.parse_int(0, 365)? as i16 }
        };
        let time_offset = if self.consume_prefix(b'/') {
            self.parse_offset(-167, 167, 1)?
        } else {
            DEFAULT_RULE_TIME
        };
        Ok(PosixTransition { date, time_offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_only() {
        let tz = PosixTimeZone::parse(b"HST10").unwrap();
        assert_eq!(tz.std_abbr, "HST");
        assert_eq!(tz.std_offset, -10 * 60 * 60);
        assert!(tz.dst.is_none());
    }

    #[test]
    fn positive_offsets_point_east() {
        // POSIX writes east-of-UTC zones with a '-'.
        let tz = PosixTimeZone::parse(b"LST-11").unwrap();
        assert_eq!(tz.std_offset, 11 * 60 * 60);
    }

    #[test]
    fn full_rule() {
        let tz =
            PosixTimeZone::parse(b"PST8PDT,M3.2.0,M11.1.0").unwrap();
        assert_eq!(tz.std_abbr, "PST");
        assert_eq!(tz.std_offset, -8 * 60 * 60);
        let dst = tz.dst.unwrap();
        assert_eq!(dst.abbr, "PDT");
        assert_eq!(dst.offset, -7 * 60 * 60);
        assert_eq!(
            dst.start,
            PosixTransition {
                date: TransitionDate::WeekdayOfMonth {
                    month: 3,
                    week: 2,
                    weekday: 0,
                },
                time_offset: 2 * 60 * 60,
            },
        );
        assert_eq!(
            dst.end,
            PosixTransition {
                date: TransitionDate::WeekdayOfMonth {
                    month: 11,
                    week: 1,
                    weekday: 0,
                },
                time_offset: 2 * 60 * 60,
            },
        );
    }

    #[test]
    fn explicit_dst_offset_and_times() {
        let tz = PosixTimeZone::parse(b"NST3:30NDT1:30,M3.2.0/0:01,M11.1.0/0:01")
            .unwrap();
        assert_eq!(tz.std_offset, -(3 * 3600 + 30 * 60));
        let dst = tz.dst.unwrap();
        assert_eq!(dst.offset, -(1 * 3600 + 30 * 60));
        assert_eq!(dst.start.time_offset, 60);
    }

    #[test]
    fn quoted_abbreviations() {
        let tz = PosixTimeZone::parse(b"<-03>3<-02>,M3.5.0/-2,M10.5.0/-1")
            .unwrap();
        assert_eq!(tz.std_abbr, "-03");
        let dst = tz.dst.unwrap();
        assert_eq!(dst.abbr, "-02");
        assert_eq!(dst.start.time_offset, -2 * 60 * 60);
    }

    #[test]
    fn julian_and_ordinal_dates() {
        let tz = PosixTimeZone::parse(b"EST5EDT,J60,304").unwrap();
        let dst = tz.dst.unwrap();
        assert_eq!(dst.start.date, TransitionDate::Julian { day: 60 });
        assert_eq!(dst.end.date, TransitionDate::Ordinal { day: 304 });
    }

    #[test]
    fn extended_hours() {
        // TZif v3 permits transition times well beyond one day.
        let tz = PosixTimeZone::parse(b"IST-2IDT,M3.4.4/26,M10.5.0").unwrap();
        assert_eq!(tz.dst.unwrap().start.time_offset, 26 * 60 * 60);
    }

    #[test]
    fn rejections() {
        assert!(PosixTimeZone::parse(b"").is_err());
        assert!(PosixTimeZone::parse(b":UTC").is_err());
        assert!(PosixTimeZone::parse(b"PS8").is_err());
        assert!(PosixTimeZone::parse(b"PST25").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT7garbage").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT,M3.2.0").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT,M13.2.0,M11.1.0").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT,M3.2.7,M11.1.0").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT,J366,M11.1.0").is_err());
        assert!(PosixTimeZone::parse(b"PST99999999999999999999").is_err());
        assert!(PosixTimeZone::parse(b"PST8PDT,M3.2.0,M11.1.0 ").is_err());
        assert!(PosixTimeZone::parse(b"<-03").is_err());
    }
}
