/*!
Time zones and the two directions of lookup between absolute and civil
time.

A [`TimeZone`] is a cheap, cloneable handle to immutable zone data. It is
one of exactly two things: a zone backed by a decoded IANA `tzfile`
transition table, or a [fixed offset](crate::tz::TimeZone::fixed) zone.

Use [`load_zone`] to obtain a handle by IANA name through the process
wide registry, or [`utc_zone`]/[`local_zone`]/[`fixed_zone`] for the
common cases.
*/

use alloc::{string::String, sync::Arc};

use crate::{
    civil::{get_weekday, get_yearday, CivilDay, CivilSecond, Weekday},
    error::{err, Error, ErrorContext},
    instant::Instant,
    tz::{fixed::FixedZone, tzif::ZoneInfo},
};

pub(crate) mod fixed;
pub(crate) mod posix;
#[cfg(feature = "std")]
mod registry;
#[cfg(feature = "tzdb-zoneinfo")]
mod source;
pub(crate) mod tzif;

#[cfg(feature = "std")]
pub use self::registry::{load_zone, local_zone, utc_zone};

/// Returns a zone that applies the given UTC offset (in seconds) for all
/// time. Offsets outside `[-86400, 86400]` collapse to UTC.
pub fn fixed_zone(offset_seconds: i32) -> TimeZone {
    TimeZone::fixed(offset_seconds)
}

/// A handle to a time zone.
///
/// Handles are cheap to clone and share: the underlying zone data is
/// immutable for its entire lifetime and reference counted. Two handles
/// obtained from the registry for the same name always observe identical
/// data.
#[derive(Clone, Debug)]
pub struct TimeZone {
    inner: Arc<Inner>,
}

/// There are exactly two kinds of zone. Fixed-offset zones answer both
/// lookups with arithmetic; everything else is a transition table.
#[derive(Debug)]
enum Inner {
    Fixed(FixedZone),
    ZoneInfo { name: String, zone: ZoneInfo },
}

impl TimeZone {
    /// Creates a fixed-offset zone. See [`fixed_zone`].
    pub fn fixed(offset_seconds: i32) -> TimeZone {
        TimeZone { inner: Arc::new(Inner::Fixed(FixedZone::new(offset_seconds))) }
    }

    /// The builtin `UTC` zone, synthesized without touching the file
    /// system.
    pub(crate) fn utc_builtin() -> TimeZone {
        TimeZone {
            inner: Arc::new(Inner::ZoneInfo {
                name: String::from("UTC"),
                zone: ZoneInfo::utc(),
            }),
        }
    }

    /// Decodes TZif data into a zone with the given name.
    pub(crate) fn from_tzif(name: &str, bytes: &[u8]) -> Result<TimeZone, Error> {
        let zone = ZoneInfo::parse(name, bytes)
            .with_context(|| err!("corrupt zone data for {name:?}"))?;
        Ok(TimeZone {
            inner: Arc::new(Inner::ZoneInfo { name: String::from(name), zone }),
        })
    }

    /// The name this zone was created with: an IANA name such as
    /// `America/Los_Angeles`, `UTC`, or a synthetic `Fixed/UTC±HH:MM:SS`
    /// name for fixed-offset zones.
    pub fn name(&self) -> &str {
        match *self.inner {
            Inner::Fixed(ref zone) => zone.name(),
            Inner::ZoneInfo { ref name, .. } => name,
        }
    }

    /// Converts an instant to the civil time this zone displays for it.
    ///
    /// The instant is truncated toward negative infinity to whole
    /// seconds before lookup; any subsecond residue is the caller's to
    /// keep. The returned abbreviation borrows from the zone and must
    /// not outlive the handle.
    pub fn breakdown(&self, instant: Instant) -> AbsoluteLookup<'_> {
        let unix_time = instant.as_second();
        let (civil, offset, is_dst, abbreviation) = match *self.inner {
            Inner::Fixed(ref zone) => (
                zone.to_civil(unix_time),
                zone.offset(),
                false,
                zone.abbreviation(),
            ),
            Inner::ZoneInfo { ref zone, .. } => {
                let bd = zone.breakdown(unix_time);
                (bd.civil, bd.offset, bd.is_dst, bd.abbreviation)
            }
        };
        AbsoluteLookup {
            civil,
            weekday: get_weekday(CivilDay::from(civil)),
            yearday: get_yearday(CivilDay::from(civil)),
            offset,
            is_dst,
            abbreviation,
        }
    }

    /// Converts a civil time to the instant(s) at which this zone
    /// displays it, classifying the civil time as unique, skipped by a
    /// forward transition, or repeated by a backward one.
    pub fn resolve(&self, cs: CivilSecond) -> CivilLookup {
        self.resolve_normalized(cs, false)
    }

    /// Like `resolve`, but from raw fields, recording whether
    /// normalization changed them.
    pub(crate) fn resolve_fields(
        &self,
        y: i32,
        m: i32,
        d: i32,
        hh: i32,
        mm: i32,
        ss: i32,
    ) -> CivilLookup {
        let cs = CivilSecond::new(y, m, d, hh, mm, ss);
        let normalized = cs.year() != y
            || cs.month() != m
            || cs.day() != d
            || cs.hour() != hh
            || cs.minute() != mm
            || cs.second() != ss;
        self.resolve_normalized(cs, normalized)
    }

    fn resolve_normalized(&self, cs: CivilSecond, normalized: bool) -> CivilLookup {
        match *self.inner {
            Inner::Fixed(ref zone) => {
                let instant = Instant::from_second(zone.to_unix(cs));
                CivilLookup {
                    kind: CivilKind::Unique,
                    pre: instant,
                    trans: instant,
                    post: instant,
                    normalized,
                }
            }
            Inner::ZoneInfo { ref zone, .. } => zone.resolve(cs, normalized),
        }
    }
}

/// The result of an instant-to-civil lookup: what a wall clock in the
/// zone reads at that instant.
#[derive(Clone, Debug)]
pub struct AbsoluteLookup<'z> {
    /// The civil time displayed.
    pub civil: CivilSecond,
    /// Derived from `civil`; never stored in zone data.
    pub weekday: Weekday,
    /// The 1-based day of the year, derived from `civil`.
    pub yearday: i32,
    /// Seconds east of UTC in effect at the instant.
    pub offset: i32,
    /// Whether daylight saving time is in effect.
    pub is_dst: bool,
    /// The abbreviation in effect, e.g. `PDT`. Borrowed from the
    /// immutable zone data.
    pub abbreviation: &'z str,
}

/// How a civil time relates to the zone's transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CivilKind {
    /// The civil time occurred exactly once.
    Unique,
    /// The civil time fell in the gap of a forward transition and never
    /// appeared on a wall clock.
    Skipped,
    /// The civil time fell in the overlap of a backward transition and
    /// appeared twice.
    Repeated,
}

/// The result of a civil-to-instant lookup.
///
/// For a `Unique` civil time all three instants are equal. For a
/// `Skipped` civil time, `pre` is the instant that would have had that
/// wall clock reading had the pre-transition offset continued, `trans`
/// is the transition itself, and `post` the analogous instant under the
/// post-transition offset. For a `Repeated` civil time, `pre` is the
/// first occurrence and `post` the second.
///
/// When in doubt, use `pre`: it is the unique instant when one exists
/// and the conventional choice otherwise.
#[derive(Clone, Copy, Debug)]
pub struct CivilLookup {
    pub kind: CivilKind,
    pub pre: Instant,
    pub trans: Instant,
    pub post: Instant,
    /// Whether the requested civil fields required normalization.
    pub normalized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_zone_lookups() {
        let zone = TimeZone::fixed(-8 * 3600);
        let al = zone.breakdown(Instant::UNIX_EPOCH);
        assert_eq!(al.civil, CivilSecond::new(1969, 12, 31, 16, 0, 0));
        assert_eq!(al.offset, -8 * 3600);
        assert!(!al.is_dst);
        assert_eq!(al.abbreviation, "UTC-08");
        assert_eq!(al.weekday, Weekday::Wednesday);
        assert_eq!(al.yearday, 365);

        let cl = zone.resolve(al.civil);
        assert_eq!(cl.kind, CivilKind::Unique);
        assert_eq!(cl.pre, Instant::UNIX_EPOCH);
        assert!(!cl.normalized);
    }

    #[test]
    fn utc_builtin_breakdown() {
        let zone = TimeZone::utc_builtin();
        assert_eq!(zone.name(), "UTC");
        let al = zone.breakdown(Instant::UNIX_EPOCH);
        assert_eq!(al.civil, CivilSecond::new(1970, 1, 1, 0, 0, 0));
        assert_eq!(al.weekday, Weekday::Thursday);
        assert_eq!(al.yearday, 1);
        assert_eq!(al.offset, 0);
        assert!(!al.is_dst);
        assert_eq!(al.abbreviation, "UTC");
    }

    #[test]
    fn resolve_fields_reports_normalization() {
        let zone = TimeZone::utc_builtin();
        let cl = zone.resolve_fields(2013, 6, 28, 19, 8, 9);
        assert!(!cl.normalized);
        let cl = zone.resolve_fields(2013, 2, 31, 0, 0, 0);
        assert!(cl.normalized);
        // Normalization carries, it doesn't reject.
        assert_eq!(
            zone.breakdown(cl.pre).civil,
            CivilSecond::new(2013, 3, 3, 0, 0, 0),
        );
    }

    #[test]
    fn subsecond_residue_is_truncated_for_lookup() {
        let zone = TimeZone::utc_builtin();
        let al = zone.breakdown(Instant::new(-1, 999_999_999));
        assert_eq!(al.civil, CivilSecond::new(1969, 12, 31, 23, 59, 59));
    }
}
