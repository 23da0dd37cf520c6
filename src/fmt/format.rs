use alloc::string::String;

use crate::civil::{get_weekday, is_leap, CivilDay};

use super::{
    util::{push_fraction, push_minimal_fraction, push_padded},
    Pieces, MONTHS_ABBREV, MONTHS_FULL, WEEKDAYS_ABBREV, WEEKDAYS_FULL,
};

pub(super) struct Formatter<'t, 'o> {
    pub(super) tm: &'t Pieces<'t>,
    pub(super) out: &'o mut String,
}

impl<'t, 'o> Formatter<'t, 'o> {
    /// Renders `fmt` into the output. This never fails: anything that
    /// isn't a recognized conversion is copied through verbatim.
    pub(super) fn format(&mut self, mut fmt: &[u8]) {
        while !fmt.is_empty() {
            if fmt[0] != b'%' {
                let end =
                    fmt.iter().position(|&b| b == b'%').unwrap_or(fmt.len());
                self.push_bytes(&fmt[..end]);
                fmt = &fmt[end..];
                continue;
            }
            let Some(&spec) = fmt.get(1) else {
                self.out.push('%');
                return;
            };
            let consumed = match spec {
                b'E' => self.fmt_extended(fmt),
                b'O' => self.fmt_alias_o(fmt),
                _ => {
                    self.fmt_basic(spec);
                    2
                }
            };
            fmt = &fmt[consumed..];
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        // Patterns are treated as bytes, but the output is a `String`.
        // All ASCII (the only thing conversions produce) passes through
        // unchanged; invalid UTF-8 in a literal degrades lossily.
        match core::str::from_utf8(bytes) {
            Ok(s) => self.out.push_str(s),
            Err(_) => {
                self.out.push_str(&String::from_utf8_lossy(bytes));
            }
        }
    }

    fn fmt_basic(&mut self, spec: u8) {
        let tm = self.tm;
        let civil = tm.civil;
        match spec {
            b'%' => self.out.push('%'),
            b'A' => {
                let i = (tm.weekday.number_from_monday() - 1) as usize;
                self.out.push_str(WEEKDAYS_FULL[i]);
            }
            b'a' => {
                let i = (tm.weekday.number_from_monday() - 1) as usize;
                self.out.push_str(WEEKDAYS_ABBREV[i]);
            }
            b'B' => {
                self.out.push_str(MONTHS_FULL[(civil.month() - 1) as usize]);
            }
            b'b' | b'h' => {
                self.out
                    .push_str(MONTHS_ABBREV[(civil.month() - 1) as usize]);
            }
            b'C' => {
                let century = i64::from(civil.year()).div_euclid(100);
                push_padded(self.out, century, 2, '0');
            }
            b'c' => self.format(b"%a %b %e %H:%M:%S %Y"),
            b'D' | b'x' => self.format(b"%m/%d/%y"),
            b'd' => push_padded(self.out, i64::from(civil.day()), 2, '0'),
            b'e' => push_padded(self.out, i64::from(civil.day()), 2, ' '),
            b'F' => self.format(b"%Y-%m-%d"),
            b'G' => {
                let (year, _) = self.iso_week();
                push_padded(self.out, i64::from(year), 1, '0');
            }
            b'g' => {
                let (year, _) = self.iso_week();
                push_padded(self.out, i64::from(year.rem_euclid(100)), 2, '0');
            }
            b'H' => push_padded(self.out, i64::from(civil.hour()), 2, '0'),
            b'I' => push_padded(self.out, i64::from(self.hour12()), 2, '0'),
            b'j' => push_padded(self.out, i64::from(tm.yearday), 3, '0'),
            b'k' => push_padded(self.out, i64::from(civil.hour()), 2, ' '),
            b'l' => push_padded(self.out, i64::from(self.hour12()), 2, ' '),
            b'M' => push_padded(self.out, i64::from(civil.minute()), 2, '0'),
            b'm' => push_padded(self.out, i64::from(civil.month()), 2, '0'),
            b'n' => self.out.push('\n'),
            b'P' => {
                self.out.push_str(if civil.hour() < 12 { "am" } else { "pm" })
            }
            b'p' => {
                self.out.push_str(if civil.hour() < 12 { "AM" } else { "PM" })
            }
            b'R' => self.format(b"%H:%M"),
            b'r' => self.format(b"%I:%M:%S %p"),
            b'S' => push_padded(self.out, i64::from(civil.second()), 2, '0'),
            b's' => push_padded(self.out, tm.unix_second, 1, '0'),
            b'T' | b'X' => self.format(b"%H:%M:%S"),
            b't' => self.out.push('\t'),
            b'U' => {
                let yday0 = i64::from(tm.yearday - 1);
                let wday = i64::from(tm.weekday.number_from_sunday());
                push_padded(self.out, (yday0 + 7 - wday) / 7, 2, '0');
            }
            b'u' => push_padded(
                self.out,
                i64::from(tm.weekday.number_from_monday()),
                1,
                '0',
            ),
            b'V' => {
                let (_, week) = self.iso_week();
                push_padded(self.out, i64::from(week), 2, '0');
            }
            b'W' => {
                let yday0 = i64::from(tm.yearday - 1);
                let wday = i64::from(tm.weekday.number_from_monday() - 1);
                push_padded(self.out, (yday0 + 7 - wday) / 7, 2, '0');
            }
            b'w' => push_padded(
                self.out,
                i64::from(tm.weekday.number_from_sunday()),
                1,
                '0',
            ),
            b'Y' => push_padded(self.out, i64::from(civil.year()), 1, '0'),
            b'y' => push_padded(
                self.out,
                i64::from(civil.year().rem_euclid(100)),
                2,
                '0',
            ),
            b'Z' => self.out.push_str(tm.abbreviation),
            b'z' => self.push_offset(false),
            unknown => {
                // Unknown conversions are emitted verbatim.
                self.out.push('%');
                self.push_bytes(&[unknown]);
            }
        }
    }

    /// Handles `%E...`: extended seconds, offset and year, plus the
    /// aliases whose `E` locale modifier means nothing in the C locale.
    /// Returns the number of pattern bytes consumed.
    fn fmt_extended(&mut self, fmt: &[u8]) -> usize {
        debug_assert!(fmt.starts_with(b"%E"));
        let rest = &fmt[2..];
        // A digit run before `S` selects the fractional precision, and
        // `%E4Y` shares the same shape.
        let digits =
            rest.iter().take_while(|&&b| b.is_ascii_digit()).count();
        if digits > 0 {
            match rest.get(digits).copied() {
                Some(b'S') if digits <= 2 => {
                    // Up to two digits means at most 99; only 0..=15 is
                    // in range.
                    let n: usize = core::str::from_utf8(&rest[..digits])
                        .expect("ascii digits")
                        .parse()
                        .expect("fits in usize");
                    if n <= 15 {
                        self.push_seconds_with_precision(n);
                        return 2 + digits + 1;
                    }
                }
                Some(b'Y') if rest[..digits] == *b"4" => {
                    self.push_year_e4();
                    return 4;
                }
                _ => {}
            }
            // Fall through to verbatim below.
        } else {
            match rest.first().copied() {
                Some(b'*') if rest.get(1) == Some(&b'S') => {
                    push_padded(
                        self.out,
                        i64::from(self.tm.civil.second()),
                        2,
                        '0',
                    );
                    push_minimal_fraction(self.out, self.tm.nanosecond);
                    return 4;
                }
                Some(b'z') => {
                    self.push_offset(true);
                    return 3;
                }
                Some(b'c') => {
                    self.format(b"%a %b %e %H:%M:%S %Y");
                    return 3;
                }
                Some(b'C') => {
                    self.fmt_basic(b'C');
                    return 3;
                }
                Some(b'x') => {
                    self.format(b"%m/%d/%y");
                    return 3;
                }
                Some(b'X') => {
                    self.format(b"%H:%M:%S");
                    return 3;
                }
                Some(b'y') => {
                    self.fmt_basic(b'y');
                    return 3;
                }
                Some(b'Y') => {
                    self.fmt_basic(b'Y');
                    return 3;
                }
                _ => {}
            }
        }
        // `%E` followed by anything unsupported is emitted verbatim,
        // modifier included.
        match rest.first().copied() {
            None => {
                self.out.push_str("%E");
                2
            }
            Some(byte) => {
                self.out.push_str("%E");
                self.push_bytes(&[byte]);
                3
            }
        }
    }

    /// Handles `%O...`: in the C locale the alternate numeric symbols
    /// are the ordinary ones, so supported letters simply alias their
    /// unmodified conversions.
    fn fmt_alias_o(&mut self, fmt: &[u8]) -> usize {
        debug_assert!(fmt.starts_with(b"%O"));
        match fmt.get(2).copied() {
            Some(
                letter @ (b'd' | b'e' | b'H' | b'I' | b'm' | b'M' | b'S'
                | b'u' | b'U' | b'V' | b'w' | b'W' | b'y'),
            ) => {
                self.fmt_basic(letter);
                3
            }
            None => {
                self.out.push_str("%O");
                2
            }
            Some(byte) => {
                self.out.push_str("%O");
                self.push_bytes(&[byte]);
                3
            }
        }
    }

    fn hour12(&self) -> i32 {
        let hour = self.tm.civil.hour() % 12;
        if hour == 0 {
            12
        } else {
            hour
        }
    }

    /// `%E0S` through `%E15S`.
    fn push_seconds_with_precision(&mut self, digits: usize) {
        push_padded(self.out, i64::from(self.tm.civil.second()), 2, '0');
        if digits > 0 {
            push_fraction(self.out, self.tm.nanosecond, digits);
        }
    }

    /// `%E4Y`: zero padded to at least four characters including the
    /// sign.
    fn push_year_e4(&mut self) {
        let year = self.tm.civil.year();
        if year < 0 {
            self.out.push('-');
            push_padded(self.out, -i64::from(year), 3, '0');
        } else {
            push_padded(self.out, i64::from(year), 4, '0');
        }
    }

    /// `%z` (`±HHMM`) and `%Ez` (`±HH:MM`). Minutes truncate, never
    /// round: `-00:44:30` renders as `-0044`.
    fn push_offset(&mut self, colon: bool) {
        let offset = self.tm.offset;
        self.out.push(if offset < 0 { '-' } else { '+' });
        let minutes = offset.unsigned_abs() / 60;
        push_padded(self.out, i64::from(minutes / 60), 2, '0');
        if colon {
            self.out.push(':');
        }
        push_padded(self.out, i64::from(minutes % 60), 2, '0');
    }

    /// The ISO 8601 week-numbering year and week for `%G`, `%g` and
    /// `%V`.
    fn iso_week(&self) -> (i32, i32) {
        let year = self.tm.civil.year();
        let dow = self.tm.weekday.number_from_monday();
        let week = (self.tm.yearday - dow + 10) / 7;
        if week < 1 {
            (year - 1, iso_weeks_in_year(year - 1))
        } else if week > iso_weeks_in_year(year) {
            (year + 1, 1)
        } else {
            (year, week)
        }
    }
}

/// An ISO week-numbering year has 53 weeks when January 1 falls on a
/// Thursday, or on a Wednesday of a leap year.
fn iso_weeks_in_year(year: i32) -> i32 {
    let jan1 = get_weekday(CivilDay::new(year, 1, 1)).number_from_monday();
    if jan1 == 4 || (is_leap(year) && jan1 == 3) {
        53
    } else {
        52
    }
}
