/*!
`strftime`-style formatting and parsing.

[`format`] renders an instant in a zone against a pattern of `%`
conversion specifiers; [`parse`] performs the reverse. The specifier set
is the POSIX one plus three extensions:

* `%E0S` through `%E15S` render the seconds with exactly that many
  fractional digits, and `%E*S` with the minimal exact fraction.
* `%Ez` renders an RFC 3339 style `±HH:MM` offset (plain `%z` renders
  `±HHMM`). When parsing, `%Ez` additionally accepts a bare `Z` as a
  synonym for `+00:00`.
* `%E4Y` renders a year zero padded to at least four characters
  including any sign, and consumes exactly four characters when parsing.

Output for named things (months, weekdays, AM/PM) is the C locale,
always; patterns and inputs are treated as bytes and never interpreted
as Unicode.

Formatting cannot fail: unknown specifiers are emitted verbatim. Parsing
returns an error when the input does not match the pattern, when a field
is out of range (parsing validates, it does not normalize), or when
non-whitespace input remains after the pattern is exhausted.
*/

use alloc::string::String;

use crate::{
    civil::{CivilSecond, Weekday},
    error::{Error, ErrorContext},
    instant::Instant,
    tz::TimeZone,
};

mod format;
mod parse;
mod util;

// The C locale names. These are bundled so that output never depends on
// the host's locale machinery.
pub(crate) const WEEKDAYS_FULL: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub(crate) const WEEKDAYS_ABBREV: [&str; 7] =
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub(crate) const MONTHS_FULL: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub(crate) const MONTHS_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct",
    "Nov", "Dec",
];

/// Everything the formatter can be asked to render, captured from one
/// zone lookup.
pub(crate) struct Pieces<'z> {
    pub(crate) civil: CivilSecond,
    pub(crate) weekday: Weekday,
    pub(crate) yearday: i32,
    pub(crate) offset: i32,
    pub(crate) abbreviation: &'z str,
    pub(crate) unix_second: i64,
    pub(crate) nanosecond: i32,
}

/// Formats the given instant as displayed by `zone`, according to
/// `pattern`.
///
/// The instant's subsecond residue is only rendered by the `%E#S`
/// family.
pub fn format(
    pattern: impl AsRef<[u8]>,
    instant: Instant,
    zone: &TimeZone,
) -> String {
    let lookup = zone.breakdown(instant);
    let pieces = Pieces {
        civil: lookup.civil,
        weekday: lookup.weekday,
        yearday: lookup.yearday,
        offset: lookup.offset,
        abbreviation: lookup.abbreviation,
        unix_second: instant.as_second(),
        nanosecond: instant.subsec_nanosecond(),
    };
    let pattern = pattern.as_ref();
    let mut out = String::with_capacity(pattern.len() * 2);
    format::Formatter { tm: &pieces, out: &mut out }.format(pattern);
    out
}

/// Parses `input` against `pattern`, interpreting the civil fields in
/// `zone`.
///
/// Fields absent from the pattern default from
/// `1970-01-01 00:00:00 +0000`. A parsed UTC offset takes precedence
/// over the zone, and `%s` takes precedence over everything. When the
/// parsed civil time is skipped or repeated in the zone, the `pre`
/// instant is returned.
pub fn parse(
    pattern: impl AsRef<[u8]>,
    input: impl AsRef<[u8]>,
    zone: &TimeZone,
) -> Result<Instant, Error> {
    parse::parse(pattern.as_ref(), input.as_ref(), zone)
        .context("strptime parsing failed")
}
