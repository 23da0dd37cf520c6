use crate::{
    civil::CivilSecond,
    error::{err, Error},
    instant::Instant,
    tz::TimeZone,
};

use super::{MONTHS_ABBREV, MONTHS_FULL, WEEKDAYS_ABBREV, WEEKDAYS_FULL};

pub(super) fn parse(
    fmt: &[u8],
    input: &[u8],
    zone: &TimeZone,
) -> Result<Instant, Error> {
    let mut parser = Parser {
        inp: input,
        year: None,
        century: None,
        year2: None,
        month: None,
        day: None,
        hour24: None,
        hour12: None,
        minute: None,
        second: None,
        nanosecond: None,
        meridiem: None,
        offset: None,
        timestamp: None,
    };
    parser.run(fmt)?;
    // Trailing whitespace is allowed; anything else is not.
    parser.skip_input_whitespace();
    if !parser.inp.is_empty() {
        return Err(err!(
            "{} bytes of input remain unparsed after the pattern",
            parser.inp.len(),
        ));
    }
    parser.finish(zone)
}

#[derive(Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

/// Collects fields as the pattern consumes the input. Assembly into an
/// instant (with defaulting, meridiem application and leap second
/// normalization) happens in `finish`, so a later conversion simply
/// overwrites an earlier one.
struct Parser<'i> {
    inp: &'i [u8],
    year: Option<i32>,
    century: Option<i32>,
    year2: Option<i32>,
    month: Option<i32>,
    day: Option<i32>,
    hour24: Option<i32>,
    hour12: Option<i32>,
    minute: Option<i32>,
    second: Option<i32>,
    nanosecond: Option<i32>,
    meridiem: Option<Meridiem>,
    offset: Option<i32>,
    timestamp: Option<i64>,
}

impl<'i> Parser<'i> {
    fn run(&mut self, mut fmt: &[u8]) -> Result<(), Error> {
        while !fmt.is_empty() {
            let byte = fmt[0];
            if byte != b'%' {
                if byte.is_ascii_whitespace() {
                    // A whitespace run in the pattern matches any run
                    // (possibly empty) of whitespace in the input.
                    while fmt
                        .first()
                        .is_some_and(|b| b.is_ascii_whitespace())
                    {
                        fmt = &fmt[1..];
                    }
                    self.skip_input_whitespace();
                } else {
                    self.expect_literal(byte)?;
                    fmt = &fmt[1..];
                }
                continue;
            }
            let Some(&spec) = fmt.get(1) else {
                return Err(err!("pattern ends with a bare '%'"));
            };
            let mut consumed = 2;
            match spec {
                b'%' => self.expect_literal(b'%')?,
                b'A' | b'a' => {
                    // Parsed for confirmation of shape, but ignored.
                    self.parse_name(&WEEKDAYS_FULL, &WEEKDAYS_ABBREV)?;
                }
                b'B' | b'b' | b'h' => {
                    let index =
                        self.parse_name(&MONTHS_FULL, &MONTHS_ABBREV)?;
                    self.month = Some(index as i32 + 1);
                }
                b'C' => self.century = Some(self.parse_num(0, 99, 2)? as i32),
                b'c' => self.run(b"%a %b %e %H:%M:%S %Y")?,
                b'D' | b'x' => self.run(b"%m/%d/%y")?,
                b'd' | b'e' => self.day = Some(self.parse_num(1, 31, 2)? as i32),
                b'F' => self.run(b"%Y-%m-%d")?,
                b'H' | b'k' => {
                    self.hour24 = Some(self.parse_num(0, 23, 2)? as i32)
                }
                b'I' | b'l' => {
                    self.hour12 = Some(self.parse_num(1, 12, 2)? as i32)
                }
                b'j' => {
                    // Parsed but ignored; the yearday never overrides
                    // the month and day fields.
                    self.parse_num(1, 365, 3)?;
                }
                b'M' => self.minute = Some(self.parse_num(0, 59, 2)? as i32),
                b'm' => self.month = Some(self.parse_num(1, 12, 2)? as i32),
                b'n' | b't' => self.skip_input_whitespace(),
                b'P' | b'p' => self.parse_meridiem()?,
                b'R' => self.run(b"%H:%M")?,
                b'r' => self.run(b"%I:%M:%S %p")?,
                b'S' => self.second = Some(self.parse_num(0, 60, 2)? as i32),
                b's' => {
                    self.timestamp =
                        Some(self.parse_signed(i64::MIN, i64::MAX)?)
                }
                b'T' | b'X' => self.run(b"%H:%M:%S")?,
                b'U' | b'W' => {
                    self.parse_num(0, 53, 2)?;
                }
                b'u' => {
                    self.parse_num(1, 7, 1)?;
                }
                b'w' => {
                    self.parse_num(0, 6, 1)?;
                }
                b'Y' => {
                    let year = self
                        .parse_signed(i64::from(i32::MIN), i64::from(i32::MAX))?;
                    self.year = Some(year as i32);
                }
                b'y' => self.year2 = Some(self.parse_num(0, 99, 2)? as i32),
                b'Z' => self.parse_zone_abbreviation()?,
                b'z' => self.offset = Some(self.parse_offset(false)?),
                b'E' => consumed = self.parse_e_modified(fmt)?,
                b'O' => consumed = self.parse_o_modified(fmt)?,
                unknown => {
                    return Err(err!(
                        "unsupported conversion %{} in pattern",
                        char::from(unknown),
                    ));
                }
            }
            fmt = &fmt[consumed..];
        }
        Ok(())
    }

    /// `%E...` conversions. Returns the pattern bytes consumed,
    /// including the leading `%E`.
    fn parse_e_modified(&mut self, fmt: &[u8]) -> Result<usize, Error> {
        debug_assert!(fmt.starts_with(b"%E"));
        let rest = &fmt[2..];
        let digits =
            rest.iter().take_while(|&&b| b.is_ascii_digit()).count();
        if digits > 0 {
            match rest.get(digits).copied() {
                Some(b'S') if digits <= 2 => {
                    let n: usize = core::str::from_utf8(&rest[..digits])
                        .expect("ascii digits")
                        .parse()
                        .expect("fits in usize");
                    if n <= 15 {
                        self.parse_seconds_with_fraction()?;
                        return Ok(2 + digits + 1);
                    }
                }
                Some(b'Y') if rest[..digits] == *b"4" => {
                    self.parse_year_e4()?;
                    return Ok(4);
                }
                _ => {}
            }
        } else {
            match rest.first().copied() {
                Some(b'*') if rest.get(1) == Some(&b'S') => {
                    self.parse_seconds_with_fraction()?;
                    return Ok(4);
                }
                Some(b'z') => {
                    self.offset = Some(self.parse_offset(true)?);
                    return Ok(3);
                }
                Some(b'c') => {
                    self.run(b"%a %b %e %H:%M:%S %Y")?;
                    return Ok(3);
                }
                Some(b'C') => {
                    self.century = Some(self.parse_num(0, 99, 2)? as i32);
                    return Ok(3);
                }
                Some(b'x') => {
                    self.run(b"%m/%d/%y")?;
                    return Ok(3);
                }
                Some(b'X') => {
                    self.run(b"%H:%M:%S")?;
                    return Ok(3);
                }
                Some(b'y') => {
                    self.year2 = Some(self.parse_num(0, 99, 2)? as i32);
                    return Ok(3);
                }
                Some(b'Y') => {
                    let year = self.parse_signed(
                        i64::from(i32::MIN),
                        i64::from(i32::MAX),
                    )?;
                    self.year = Some(year as i32);
                    return Ok(3);
                }
                _ => {}
            }
        }
        Err(err!("unsupported %E conversion in pattern"))
    }

    /// `%O...` conversions: alternate numeric symbols are ordinary
    /// digits in the C locale, so these alias the unmodified forms.
    fn parse_o_modified(&mut self, fmt: &[u8]) -> Result<usize, Error> {
        debug_assert!(fmt.starts_with(b"%O"));
        match fmt.get(2).copied() {
            Some(b'd' | b'e') => {
                self.day = Some(self.parse_num(1, 31, 2)? as i32)
            }
            Some(b'H') => self.hour24 = Some(self.parse_num(0, 23, 2)? as i32),
            Some(b'I') => self.hour12 = Some(self.parse_num(1, 12, 2)? as i32),
            Some(b'm') => self.month = Some(self.parse_num(1, 12, 2)? as i32),
            Some(b'M') => self.minute = Some(self.parse_num(0, 59, 2)? as i32),
            Some(b'S') => self.second = Some(self.parse_num(0, 60, 2)? as i32),
            Some(b'u') => {
                self.parse_num(1, 7, 1)?;
            }
            Some(b'U' | b'V' | b'W') => {
                self.parse_num(0, 53, 2)?;
            }
            Some(b'w') => {
                self.parse_num(0, 6, 1)?;
            }
            Some(b'y') => self.year2 = Some(self.parse_num(0, 99, 2)? as i32),
            _ => return Err(err!("unsupported %O conversion in pattern")),
        }
        Ok(3)
    }

    fn expect_literal(&mut self, byte: u8) -> Result<(), Error> {
        if self.inp.first() != Some(&byte) {
            return Err(err!(
                "expected {:?} in input",
                char::from(byte),
            ));
        }
        self.inp = &self.inp[1..];
        Ok(())
    }

    fn skip_input_whitespace(&mut self) {
        while self.inp.first().is_some_and(|b| b.is_ascii_whitespace()) {
            self.inp = &self.inp[1..];
        }
    }

    /// Consumes the longest run of digits (up to `max_digits`) whose
    /// value stays within `max`, then requires the value to be at least
    /// `min`. No sign, no whitespace.
    fn parse_num(
        &mut self,
        min: i64,
        max: i64,
        max_digits: usize,
    ) -> Result<i64, Error> {
        let mut value: i64 = 0;
        let mut len = 0;
        while len < max_digits {
            let Some(&byte) = self.inp.get(len) else { break };
            if !byte.is_ascii_digit() {
                break;
            }
            let next = value * 10 + i64::from(byte - b'0');
            if next > max {
                break;
            }
            value = next;
            len += 1;
        }
        if len == 0 {
            return Err(err!("expected a number in {min}..={max}"));
        }
        if value < min {
            return Err(err!("number {value} is below the minimum {min}"));
        }
        self.inp = &self.inp[len..];
        Ok(value)
    }

    /// A signed decimal number with unbounded digits. `-0` is rejected
    /// so that a sign always carries information.
    fn parse_signed(&mut self, min: i64, max: i64) -> Result<i64, Error> {
        let mut rest = self.inp;
        let negative = match rest.first() {
            Some(b'-') => {
                rest = &rest[1..];
                true
            }
            Some(b'+') => {
                rest = &rest[1..];
                false
            }
            _ => false,
        };
        let mut value: i64 = 0;
        let mut len = 0;
        while let Some(&byte) = rest.get(len) {
            if !byte.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(byte - b'0')))
                .ok_or_else(|| err!("number in input overflows"))?;
            len += 1;
        }
        if len == 0 {
            return Err(err!("expected a number"));
        }
        if negative {
            if value == 0 {
                return Err(err!("negative zero is not a meaningful value"));
            }
            value = -value;
        }
        if value < min || value > max {
            return Err(err!("number {value} is not in {min}..={max}"));
        }
        self.inp = &rest[len..];
        Ok(value)
    }

    /// Case-insensitively matches the longest of the given names,
    /// returning its index within its table.
    fn parse_name(
        &mut self,
        full: &[&str],
        abbrev: &[&str],
    ) -> Result<usize, Error> {
        debug_assert_eq!(full.len(), abbrev.len());
        let mut best: Option<(usize, usize)> = None;
        for (i, name) in full.iter().chain(abbrev.iter()).enumerate() {
            let len = name.len();
            if self.inp.len() >= len
                && self.inp[..len].eq_ignore_ascii_case(name.as_bytes())
                && best.map_or(true, |(_, best_len)| len > best_len)
            {
                best = Some((i % full.len(), len));
            }
        }
        let Some((index, len)) = best else {
            return Err(err!("expected one of {full:?} or {abbrev:?}"));
        };
        self.inp = &self.inp[len..];
        Ok(index)
    }

    fn parse_meridiem(&mut self) -> Result<(), Error> {
        if self.inp.len() >= 2 {
            if self.inp[..2].eq_ignore_ascii_case(b"am") {
                self.meridiem = Some(Meridiem::Am);
                self.inp = &self.inp[2..];
                return Ok(());
            }
            if self.inp[..2].eq_ignore_ascii_case(b"pm") {
                self.meridiem = Some(Meridiem::Pm);
                self.inp = &self.inp[2..];
                return Ok(());
            }
        }
        Err(err!("expected AM or PM"))
    }

    /// `%Z` is accepted for symmetry with formatting, but abbreviations
    /// are ambiguous, so the matched letters are discarded.
    fn parse_zone_abbreviation(&mut self) -> Result<(), Error> {
        let len = self
            .inp
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if len == 0 {
            return Err(err!("expected a time zone abbreviation"));
        }
        self.inp = &self.inp[len..];
        Ok(())
    }

    /// `%z` accepts `±HHMM` and `±HH`; with `colon_ok` (i.e. `%Ez`)
    /// additionally `±HH:MM` and the single letter `Z`.
    fn parse_offset(&mut self, colon_ok: bool) -> Result<i32, Error> {
        if colon_ok && self.inp.first() == Some(&b'Z') {
            self.inp = &self.inp[1..];
            return Ok(0);
        }
        let sign = match self.inp.first() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Err(err!("expected '+' or '-' to begin an offset")),
        };
        let rest = &self.inp[1..];
        let digits =
            rest.iter().take_while(|b| b.is_ascii_digit()).count();
        let (hours, minutes, used) = if digits >= 4 {
            (two_digits(rest, 0), two_digits(rest, 2), 4)
        } else if digits == 2 {
            if colon_ok
                && rest.get(2) == Some(&b':')
                && rest.len() >= 5
                && rest[3].is_ascii_digit()
                && rest[4].is_ascii_digit()
            {
                (two_digits(rest, 0), two_digits(rest, 3), 5)
            } else {
                (two_digits(rest, 0), 0, 2)
            }
        } else {
            return Err(err!("malformed UTC offset"));
        };
        if minutes > 59 {
            return Err(err!("UTC offset minutes {minutes} exceed 59"));
        }
        let seconds = (hours * 60 + minutes) * 60;
        if seconds >= 86_400 {
            return Err(err!("UTC offset is a day or more"));
        }
        self.inp = &rest[used..];
        Ok(sign * seconds)
    }

    /// Seconds in `[0, 60]` with an optional fraction, for the `%E#S`
    /// family. Digits beyond nanosecond resolution are consumed and
    /// discarded, never rounded.
    fn parse_seconds_with_fraction(&mut self) -> Result<(), Error> {
        let second = self.parse_num(0, 60, 2)? as i32;
        self.second = Some(second);
        if self.inp.first() == Some(&b'.')
            && self.inp.get(1).is_some_and(|b| b.is_ascii_digit())
        {
            let rest = &self.inp[1..];
            let digits =
                rest.iter().take_while(|b| b.is_ascii_digit()).count();
            let mut nanoseconds: i64 = 0;
            for &byte in rest[..digits.min(9)].iter() {
                nanoseconds = nanoseconds * 10 + i64::from(byte - b'0');
            }
            for _ in digits..9 {
                nanoseconds *= 10;
            }
            self.nanosecond = Some(nanoseconds as i32);
            self.inp = &rest[digits..];
        }
        Ok(())
    }

    /// `%E4Y` consumes exactly four characters, including any sign.
    fn parse_year_e4(&mut self) -> Result<(), Error> {
        if self.inp.len() < 4 {
            return Err(err!("%E4Y requires exactly four characters"));
        }
        let (negative, digits) = if self.inp[0] == b'-' {
            (true, &self.inp[1..4])
        } else {
            (false, &self.inp[..4])
        };
        let mut value: i32 = 0;
        for &byte in digits {
            if !byte.is_ascii_digit() {
                return Err(err!("%E4Y requires four digit characters"));
            }
            value = value * 10 + i32::from(byte - b'0');
        }
        if negative && value == 0 {
            return Err(err!("negative zero is not a meaningful year"));
        }
        self.year = Some(if negative { -value } else { value });
        self.inp = &self.inp[4..];
        Ok(())
    }

    /// Assembles the collected fields into an instant.
    fn finish(mut self, zone: &TimeZone) -> Result<Instant, Error> {
        // An epoch-seconds conversion renders everything else moot,
        // including the zone.
        if let Some(timestamp) = self.timestamp {
            return Ok(Instant::from_second(timestamp));
        }

        // A civil :60 is normalized to :00 of the next minute, dropping
        // the fraction. Anything above 60 never parses.
        let mut second = self.second.unwrap_or(0);
        let mut leap = 0;
        if second == 60 {
            second = 59;
            leap = 1;
            self.nanosecond = None;
        }

        let year = match (self.year, self.century, self.year2) {
            (Some(year), _, _) => year,
            (None, Some(century), year2) => century * 100 + year2.unwrap_or(0),
            (None, None, Some(year2)) => {
                year2 + if year2 >= 69 { 1900 } else { 2000 }
            }
            (None, None, None) => 1970,
        };
        let hour = match (self.hour24, self.hour12, self.meridiem) {
            (Some(hour), _, _) => hour,
            (None, Some(hour12), Some(Meridiem::Am)) => hour12 % 12,
            (None, Some(hour12), Some(Meridiem::Pm)) => hour12 % 12 + 12,
            (None, Some(hour12), None) => hour12,
            (None, None, _) => 0,
        };
        let month = self.month.unwrap_or(1);
        let day = self.day.unwrap_or(1);
        let minute = self.minute.unwrap_or(0);

        // Parsing validates; it does not normalize.
        let cs = CivilSecond::new(year, month, day, hour, minute, second);
        if cs.year() != year
            || cs.month() != month
            || cs.day() != day
            || cs.hour() != hour
            || cs.minute() != minute
            || cs.second() != second
        {
            return Err(err!(
                "parsed civil time {year:04}-{month:02}-{day:02} \
                 {hour:02}:{minute:02}:{second:02} is not a real \
                 date-time",
            ));
        }

        // An explicit offset overrides the zone; otherwise resolve in
        // the zone, preferring the `pre` instant for skipped and
        // repeated civil times.
        let unix_second = match self.offset {
            Some(offset) => cs.seconds_from_epoch() - i64::from(offset),
            None => zone.resolve(cs).pre.as_second(),
        };
        Ok(Instant::new(
            unix_second.saturating_add(leap),
            self.nanosecond.unwrap_or(0),
        ))
    }
}

fn two_digits(bytes: &[u8], at: usize) -> i32 {
    i32::from(bytes[at] - b'0') * 10 + i32::from(bytes[at + 1] - b'0')
}
