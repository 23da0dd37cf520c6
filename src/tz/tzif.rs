/*!
The zoneinfo engine: decoding binary TZif data and answering both
directions of time zone lookup from the resulting transition table.

TZif is the binary format described by RFC 8536 and shipped under
`/usr/share/zoneinfo` on Unix systems. Only version 2 and newer files are
accepted, and only their 64-bit section is decoded. Files that encode
leap seconds ("right/" zoneinfo) are rejected outright, since everything
in this crate assumes 60-second minutes.

When the trailing POSIX rule describes a DST regime, the transition table
is extended at load time with two synthesized transitions per year for
400 years past the last recorded transition. 400 Gregorian years is a
whole number of weeks, so queries beyond even the synthesized range can
be answered by projecting onto it; see `breakdown` and `resolve`.
*/

use alloc::{string::String, vec::Vec};

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    civil::{CivilDay, CivilSecond},
    error::{err, Error},
    instant::Instant,
    tz::posix::{PosixDst, PosixTimeZone, PosixTransition, TransitionDate},
    tz::{CivilKind, CivilLookup},
};

const SECS_PER_DAY: i64 = 86_400;

/// 400-year chunks always have 146097 days (20871 weeks).
pub(crate) const SECS_PER_400_YEARS: i64 = 146_097 * SECS_PER_DAY;

// Transition times are clamped to the range of Unix times whose civil
// reading stays within `i32` years under any legal offset. zic likes to
// emit a "big bang" transition at -2^59, far outside any civil year we
// can represent, and refusing such files outright would be useless.
//
//   -67768100567884800 == -2147483648-01-02 00:00:00 +00:00
//    67767976233446399 ==  2147483647-12-30 23:59:59 +00:00
const TIMESTAMP_MIN: i64 = -67768100567884800;
const TIMESTAMP_MAX: i64 = 67767976233446399;

/// Days before the start of each (1-based) month, in non-leap and leap
/// years respectively. The extra entry at index 13 covers "before the
/// month after December" for last-week rule handling.
const MONTH_OFFSETS: [[i64; 14]; 2] = [
    [-1, 0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365],
    [-1, 0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366],
];

fn is_leap_year(y: i64) -> bool {
    y % 4 == 0 && (y % 100 != 0 || y % 400 == 0)
}

/// One entry in a zone's table of distinct offset regimes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct TransitionType {
    /// Seconds east of UTC, strictly within `(-86400, 86400)`.
    pub(crate) utc_offset: i32,
    pub(crate) is_dst: bool,
    /// Index of the abbreviation in the NUL-delimited pool.
    pub(crate) abbr_index: u8,
}

/// One offset change.
///
/// The two civil values are precomputed at load time so that
/// civil-to-instant lookups are pure binary searches: `civil` is the
/// local wall clock reading at which the new offset first applies, and
/// `prev_civil` is the wall clock reading of the last second under the
/// prior offset. The open interval between them (in either direction) is
/// precisely the set of wall clock readings skipped or repeated by the
/// transition.
#[derive(Clone, Debug)]
pub(crate) struct Transition {
    pub(crate) unix_time: i64,
    pub(crate) type_index: u8,
    pub(crate) civil: CivilSecond,
    pub(crate) prev_civil: CivilSecond,
}

/// The result of an instant-to-civil lookup against one zone.
#[derive(Clone, Debug)]
pub(crate) struct Breakdown<'z> {
    pub(crate) civil: CivilSecond,
    pub(crate) offset: i32,
    pub(crate) is_dst: bool,
    pub(crate) abbreviation: &'z str,
}

/// A time zone backed by a transition table.
#[derive(Debug)]
pub(crate) struct ZoneInfo {
    /// Ordered strictly by both `unix_time` and `civil`. (An offset
    /// change never crosses another one in civil time; this is verified
    /// at load.)
    transitions: Vec<Transition>,
    types: Vec<TransitionType>,
    /// NUL-delimited abbreviation pool.
    designations: String,
    /// The type used for instants before the first transition.
    default_type: u8,
    /// Whether the table was extended from the POSIX tail rule.
    extended: bool,
    /// The final real year covered by synthesized transitions.
    last_year: i64,
    /// Index of the last successful instant-lookup binary search. Racing
    /// readers may observe a stale value; that only costs a re-search.
    instant_hint: AtomicUsize,
    /// Like `instant_hint`, but for civil lookups.
    civil_hint: AtomicUsize,
}

impl ZoneInfo {
    /// Builds the zone that tzdata would call `UTC` without touching the
    /// file system: a single transition at the earliest representable
    /// time with offset zero.
    pub(crate) fn utc() -> ZoneInfo {
        let types = alloc::vec![TransitionType {
            utc_offset: 0,
            is_dst: false,
            abbr_index: 0,
        }];
        let unix_time = TIMESTAMP_MIN;
        let civil = CivilSecond::from_seconds_from_epoch(unix_time);
        let transitions = alloc::vec![Transition {
            unix_time,
            type_index: 0,
            civil,
            prev_civil: civil - 1,
        }];
        ZoneInfo {
            transitions,
            types,
            designations: String::from("UTC\0"),
            default_type: 0,
            extended: false,
            last_year: 0,
            instant_hint: AtomicUsize::new(0),
            civil_hint: AtomicUsize::new(0),
        }
    }

    /// Parses TZif data. The name is used only for diagnostics.
    ///
    /// It is safe to feed arbitrary or untrusted bytes to this function:
    /// it never panics and its resource use is bounded by a small
    /// constant factor of the input size (plus the fixed-size synthesized
    /// extension).
    pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<ZoneInfo, Error> {
        let (header32, rest) = Header::parse(4, bytes)?;
        if header32.version == 0 {
            return Err(err!(
                "TZif data is version 1 only, which lacks the required \
                 64-bit section",
            ));
        }
        let (_, rest) =
            try_split_at("32-bit data block", rest, header32.data_block_len()?)?;
        let (header, rest) = Header::parse(8, rest)?;
        if header.version == 0 {
            return Err(err!(
                "second TZif header reports version 1, expected 2+",
            ));
        }
        if header.tzh_leapcnt != 0 {
            // Leap-second encoded ("right/") zoneinfo would break the
            // 60-second-minute arithmetic everywhere in this crate.
            return Err(err!(
                "TZif data declares {} leap seconds; leap-second encoded \
                 zoneinfo is not supported",
                header.tzh_leapcnt,
            ));
        }

        // Capacity comes from the actual byte lengths checked in each
        // parse step below, not from the header's counts, so a bogus
        // count cannot provoke a huge allocation.
        let mut zone = ZoneInfo {
            transitions: Vec::new(),
            types: Vec::new(),
            designations: String::new(),
            default_type: 0,
            extended: false,
            last_year: 0,
            instant_hint: AtomicUsize::new(0),
            civil_hint: AtomicUsize::new(0),
        };

        let rest = zone.parse_transitions(&header, rest)?;
        let rest = zone.parse_transition_types(&header, rest)?;
        let rest = zone.parse_local_time_types(&header, rest)?;
        let rest = zone.parse_designations(&header, rest)?;
        let rest = zone.skip_indicators(&header, rest)?;
        let tail = zone.parse_footer(rest)?;

        zone.choose_default_type();
        zone.apply_posix_tail(name, &tail);
        zone.precompute_civil()?;
        Ok(zone)
    }

    fn parse_transitions<'b>(
        &mut self,
        header: &Header,
        bytes: &'b [u8],
    ) -> Result<&'b [u8], Error> {
        let (bytes, rest) = try_split_at(
            "transition times",
            bytes,
            header.transition_times_len()?,
        )?;
        for chunk in bytes.chunks_exact(8) {
            let mut unix_time = from_be_bytes_i64(chunk);
            if unix_time < TIMESTAMP_MIN || unix_time > TIMESTAMP_MAX {
                let clamped = unix_time.clamp(TIMESTAMP_MIN, TIMESTAMP_MAX);
                warn!(
                    "transition time {unix_time} is outside the \
                     representable civil range, clamping to {clamped}",
                );
                unix_time = clamped;
            }
            if let Some(prev) = self.transitions.last() {
                if prev.unix_time >= unix_time {
                    return Err(err!(
                        "transition times are not strictly increasing \
                         ({} then {})",
                        prev.unix_time,
                        unix_time,
                    ));
                }
            }
            let civil = CivilSecond::default();
            self.transitions.push(Transition {
                unix_time,
                type_index: 0,
                civil,
                prev_civil: civil,
            });
        }
        Ok(rest)
    }

    fn parse_transition_types<'b>(
        &mut self,
        header: &Header,
        bytes: &'b [u8],
    ) -> Result<&'b [u8], Error> {
        let (bytes, rest) =
            try_split_at("transition types", bytes, header.tzh_timecnt)?;
        for (i, &type_index) in bytes.iter().enumerate() {
            if usize::from(type_index) >= header.tzh_typecnt {
                return Err(err!(
                    "transition type index {type_index} exceeds the \
                     {} local time types",
                    header.tzh_typecnt,
                ));
            }
            self.transitions[i].type_index = type_index;
        }
        Ok(rest)
    }

    fn parse_local_time_types<'b>(
        &mut self,
        header: &Header,
        bytes: &'b [u8],
    ) -> Result<&'b [u8], Error> {
        let (bytes, rest) = try_split_at(
            "local time types",
            bytes,
            header.local_time_types_len()?,
        )?;
        for chunk in bytes.chunks_exact(6) {
            let utc_offset = from_be_bytes_i32(&chunk[..4]);
            if utc_offset <= -(SECS_PER_DAY as i32)
                || utc_offset >= SECS_PER_DAY as i32
            {
                return Err(err!(
                    "local time type offset {utc_offset} is not strictly \
                     within one day of UTC",
                ));
            }
            let is_dst = chunk[4] != 0;
            let abbr_index = chunk[5];
            if usize::from(abbr_index) >= header.tzh_charcnt {
                return Err(err!(
                    "abbreviation index {abbr_index} exceeds the \
                     {} abbreviation bytes",
                    header.tzh_charcnt,
                ));
            }
            self.types.push(TransitionType { utc_offset, is_dst, abbr_index });
        }
        Ok(rest)
    }

    fn parse_designations<'b>(
        &mut self,
        header: &Header,
        bytes: &'b [u8],
    ) -> Result<&'b [u8], Error> {
        let (bytes, rest) =
            try_split_at("abbreviations", bytes, header.tzh_charcnt)?;
        self.designations = String::from_utf8(bytes.to_vec())
            .map_err(|_| err!("abbreviation pool is not valid UTF-8"))?;
        // Every type's abbreviation must begin on a character boundary
        // and be NUL terminated within the pool, or lookups would have
        // to guess where it ends.
        for typ in self.types.iter() {
            let start = usize::from(typ.abbr_index);
            match self.designations.get(start..) {
                Some(tail) if tail.contains('\0') => {}
                _ => {
                    return Err(err!(
                        "abbreviation at index {start} is not NUL terminated",
                    ));
                }
            }
        }
        Ok(rest)
    }

    fn skip_indicators<'b>(
        &mut self,
        header: &Header,
        bytes: &'b [u8],
    ) -> Result<&'b [u8], Error> {
        // The standard/wall and UT/local indicators only matter when
        // interpreting a POSIX spec without start/end rules (zic -p),
        // which never reaches this decoder. Skip them.
        let (_, rest) = try_split_at(
            "standard/wall indicators",
            bytes,
            header.tzh_ttisstdcnt,
        )?;
        let (_, rest) =
            try_split_at("UT/local indicators", rest, header.tzh_ttisutcnt)?;
        Ok(rest)
    }

    /// Reads the newline-bracketed POSIX rule at the end of the data.
    /// Anything after the closing newline is ignored for forwards
    /// compatibility.
    fn parse_footer(&mut self, bytes: &[u8]) -> Result<String, Error> {
        if bytes.first() != Some(&b'\n') {
            return Err(err!(
                "expected newline before the POSIX rule at the end of \
                 TZif data",
            ));
        }
        let bytes = &bytes[1..];
        let end = bytes.iter().position(|&b| b == b'\n').ok_or_else(|| {
            err!("POSIX rule at the end of TZif data is unterminated")
        })?;
        let tail = core::str::from_utf8(&bytes[..end])
            .map_err(|_| err!("POSIX rule is not valid UTF-8"))?;
        Ok(String::from(tail))
    }

    /// Picks the type used for instants before the first transition:
    /// type 0, unless it is a DST type, in which case the nearest
    /// non-DST type in the table.
    fn choose_default_type(&mut self) {
        self.default_type = 0;
        if self.transitions.is_empty() {
            return;
        }
        let seen_type_0 =
            self.transitions.iter().any(|tr| tr.type_index == 0);
        if !seen_type_0 {
            return;
        }
        let mut index = 0;
        if self.types[0].is_dst {
            index = usize::from(self.transitions[0].type_index);
            while index != 0 && self.types[index].is_dst {
                index -= 1;
            }
        }
        while index != self.types.len() && self.types[index].is_dst {
            index += 1;
        }
        if index != self.types.len() {
            self.default_type = index as u8;
        }
    }

    /// Handles the trailing POSIX rule: validates it against the final
    /// recorded transition and, when it describes a DST regime, extends
    /// the transition table by 400 years.
    ///
    /// Nothing here fails the load. A malformed or inconsistent tail is
    /// logged, and queries past the recorded range then fall back to the
    /// last real transition's type.
    fn apply_posix_tail(&mut self, name: &str, tail: &str) {
        if tail.is_empty() {
            return;
        }
        let posix = match PosixTimeZone::parse(tail.as_bytes()) {
            Ok(posix) => posix,
            Err(e) => {
                warn!("{name}: failed to parse POSIX rule {tail:?}: {e}");
                return;
            }
        };
        let timecnt = self.transitions.len();
        let Some(ref dst) = posix.dst else {
            // A std-only rule should match the last (or default)
            // transition type, and then the future falls out naturally.
            let index = match self.transitions.last() {
                Some(tr) => usize::from(tr.type_index),
                None => usize::from(self.default_type),
            };
            self.check_tail_type(
                name,
                tail,
                &self.types[index],
                posix.std_offset,
                false,
                &posix.std_abbr,
            );
            return;
        };
        if timecnt < 2 {
            warn!("{name}: too few transitions for POSIX rule {tail:?}");
            return;
        }
        if self.transitions[timecnt - 1].unix_time < 0 {
            warn!("{name}: old transitions for POSIX rule {tail:?}");
            return;
        }
        self.extend_transitions(name, tail, &posix, dst);
    }

    /// Extends the table with two transitions per year for 400 years
    /// beyond the last recorded transition, following the tail rule.
    /// zic(8) could do this for us, but "slim" files don't.
    fn extend_transitions(
        &mut self,
        name: &str,
        tail: &str,
        posix: &PosixTimeZone,
        dst: &PosixDst,
    ) {
        let timecnt = self.transitions.len();
        self.transitions.reserve(400 * 2);
        self.extended = true;

        // The rule must match the final two transitions, which have
        // different DST flags and fall in the same calendar year.
        let tr0 = self.transitions[timecnt - 1].clone();
        let tr1 = self.transitions[timecnt - 2].clone();
        let tt0 = self.types[usize::from(tr0.type_index)].clone();
        let tt1 = self.types[usize::from(tr1.type_index)].clone();
        let (spring, autumn) =
            if tt0.is_dst { (&tt0, &tt1) } else { (&tt1, &tt0) };
        self.check_tail_type(name, tail, spring, dst.offset, true, &dst.abbr);
        self.check_tail_type(
            name,
            tail,
            autumn,
            posix.std_offset,
            false,
            &posix.std_abbr,
        );
        self.last_year = i64::from(
            CivilSecond::from_seconds_from_epoch(
                tr0.unix_time + i64::from(tt0.utc_offset),
            )
            .year(),
        );
        let tr1_year = i64::from(
            CivilSecond::from_seconds_from_epoch(
                tr1.unix_time + i64::from(tt1.utc_offset),
            )
            .year(),
        );
        if tr1_year != self.last_year {
            warn!("{name}: final transitions not in same year");
        }

        // pt1 takes us to tr1's type, pt0 back to tr0's type.
        let (pt1, pt0) = if tt0.is_dst {
            (&dst.end, &dst.start)
        } else {
            (&dst.start, &dst.end)
        };
        let jan1_ord = CivilDay::new(self.last_year as i32, 1, 1)
            - CivilDay::default();
        let mut jan1_time = jan1_ord * SECS_PER_DAY;
        // 1970-01-01 was a Thursday; weekdays here count 0 = Sunday.
        let mut jan1_weekday = ((4 + jan1_ord) % 7 + 7) % 7;
        let mut leap_year = is_leap_year(self.last_year);
        let limit = self.last_year + 400;
        while self.last_year < limit {
            self.last_year += 1;
            let days = if leap_year { 366 } else { 365 };
            jan1_time += days * SECS_PER_DAY;
            jan1_weekday = (jan1_weekday + days) % 7;
            leap_year = is_leap_year(self.last_year);

            let tr1_offset = trans_offset(leap_year, jan1_weekday, pt1);
            self.push_synthesized(
                jan1_time + tr1_offset - i64::from(tt0.utc_offset),
                tr1.type_index,
            );
            let tr0_offset = trans_offset(leap_year, jan1_weekday, pt0);
            self.push_synthesized(
                jan1_time + tr0_offset - i64::from(tt1.utc_offset),
                tr0.type_index,
            );
        }
    }

    fn push_synthesized(&mut self, unix_time: i64, type_index: u8) {
        let civil = CivilSecond::default();
        self.transitions.push(Transition {
            unix_time,
            type_index,
            civil,
            prev_civil: civil,
        });
    }

    /// Logs when a transition type disagrees with the POSIX tail.
    fn check_tail_type(
        &self,
        name: &str,
        tail: &str,
        tt: &TransitionType,
        offset: i32,
        is_dst: bool,
        abbr: &str,
    ) {
        if tt.utc_offset != offset
            || tt.is_dst != is_dst
            || self.designation(tt.abbr_index) != abbr
        {
            warn!(
                "{name}: transition offset={}/{}/abbr={} does not match \
                 POSIX rule {tail:?}",
                tt.utc_offset,
                if tt.is_dst { "DST" } else { "STD" },
                self.designation(tt.abbr_index),
            );
            let _ = (name, tail);
        }
    }

    /// Computes the local civil time of each transition and of the
    /// second preceding it, then verifies that transitions are ordered
    /// in civil time as well. These are what make `resolve` a pure
    /// binary search.
    fn precompute_civil(&mut self) -> Result<(), Error> {
        let mut prev_type = usize::from(self.default_type);
        for i in 0..self.transitions.len() {
            let unix_time = self.transitions[i].unix_time;
            let prev_offset = i64::from(self.types[prev_type].utc_offset);
            self.transitions[i].prev_civil =
                CivilSecond::from_seconds_from_epoch(unix_time + prev_offset)
                    - 1;
            prev_type = usize::from(self.transitions[i].type_index);
            let offset = i64::from(self.types[prev_type].utc_offset);
            self.transitions[i].civil =
                CivilSecond::from_seconds_from_epoch(unix_time + offset);
            if i != 0 {
                // An offset change may never cross another one in civil
                // time. `resolve` depends on this.
                if self.transitions[i - 1].civil >= self.transitions[i].civil
                {
                    return Err(err!(
                        "transitions are not ordered by civil time",
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn designation(&self, abbr_index: u8) -> &str {
        let start = usize::from(abbr_index);
        let rest = &self.designations[start..];
        match rest.find('\0') {
            Some(end) => &rest[..end],
            None => rest,
        }
    }

    fn load_hint(&self, civil: bool) -> usize {
        let hint = if civil { &self.civil_hint } else { &self.instant_hint };
        hint.load(Ordering::Relaxed)
    }

    fn store_hint(&self, civil: bool, value: usize) {
        let hint = if civil { &self.civil_hint } else { &self.instant_hint };
        hint.store(value, Ordering::Relaxed);
    }

    /// Instant-to-civil lookup.
    pub(crate) fn breakdown(&self, unix_time: i64) -> Breakdown<'_> {
        let timecnt = self.transitions.len();
        if timecnt == 0 || unix_time < self.transitions[0].unix_time {
            return self.local_time(unix_time, self.default_type, 0);
        }
        if unix_time >= self.transitions[timecnt - 1].unix_time {
            // After the last transition. With an extended table, shift
            // back by whole 400-year cycles of calendaric equivalence
            // and compensate in the final year.
            if self.extended {
                let diff =
                    unix_time - self.transitions[timecnt - 1].unix_time;
                let shift = diff / SECS_PER_400_YEARS + 1;
                let shifted = unix_time - shift * SECS_PER_400_YEARS;
                let type_index = self.transition_type_index(shifted);
                return self.local_time(shifted, type_index, shift * 400);
            }
            let type_index = self.transitions[timecnt - 1].type_index;
            return self.local_time(unix_time, type_index, 0);
        }
        let type_index = self.transition_type_index(unix_time);
        self.local_time(unix_time, type_index, 0)
    }

    /// Finds the type in effect at `unix_time`, which must lie within
    /// the transition table. The hint is probed first and refreshed
    /// after any binary search.
    fn transition_type_index(&self, unix_time: i64) -> u8 {
        let timecnt = self.transitions.len();
        let hint = self.load_hint(false);
        if 0 < hint && hint < timecnt {
            if unix_time < self.transitions[hint].unix_time
                && unix_time >= self.transitions[hint - 1].unix_time
            {
                return self.transitions[hint - 1].type_index;
            }
        }
        let index = self
            .transitions
            .partition_point(|tr| tr.unix_time <= unix_time);
        self.store_hint(false, index);
        self.transitions[index - 1].type_index
    }

    /// Converts a Unix time under the given type into a `Breakdown`,
    /// adding `year_shift` years (used by the 400-year projection).
    fn local_time(
        &self,
        unix_time: i64,
        type_index: u8,
        year_shift: i64,
    ) -> Breakdown<'_> {
        let tt = &self.types[usize::from(type_index)];
        let mut civil = CivilSecond::from_seconds_from_epoch(
            unix_time + i64::from(tt.utc_offset),
        );
        if year_shift != 0 {
            civil = project_years(civil, year_shift);
        }
        Breakdown {
            civil,
            offset: tt.utc_offset,
            is_dst: tt.is_dst,
            abbreviation: self.designation(tt.abbr_index),
        }
    }

    /// Civil-to-instant lookup, classifying the civil time as unique,
    /// skipped or repeated.
    pub(crate) fn resolve(
        &self,
        cs: CivilSecond,
        normalized: bool,
    ) -> CivilLookup {
        let timecnt = self.transitions.len();
        if timecnt == 0 {
            let offset =
                self.types[usize::from(self.default_type)].utc_offset;
            return make_unique(
                cs.seconds_from_epoch() - i64::from(offset),
                normalized,
            );
        }

        // Find the first transition strictly after our civil time.
        let index = if cs < self.transitions[0].civil {
            0
        } else if cs >= self.transitions[timecnt - 1].civil {
            timecnt
        } else {
            let hint = self.load_hint(true);
            if 0 < hint
                && hint < timecnt
                && cs < self.transitions[hint].civil
                && cs >= self.transitions[hint - 1].civil
            {
                hint
            } else {
                let index =
                    self.transitions.partition_point(|tr| tr.civil <= cs);
                self.store_hint(true, index);
                index
            }
        };

        if index == 0 {
            let tr = &self.transitions[0];
            if cs <= tr.prev_civil {
                // Before the first transition: the default type applies.
                let offset =
                    self.types[usize::from(self.default_type)].utc_offset;
                return make_unique(
                    cs.seconds_from_epoch() - i64::from(offset),
                    normalized,
                );
            }
            // tr.prev_civil < cs < tr.civil
            return make_skipped(tr, cs, normalized);
        }

        if index == timecnt {
            let tr = &self.transitions[timecnt - 1];
            if tr.prev_civil < cs {
                // After the last transition. Same 400-year projection as
                // the instant direction, applied to the civil input.
                if self.extended && i64::from(cs.year()) > self.last_year {
                    let shift =
                        (i64::from(cs.year()) - self.last_year) / 400 + 1;
                    let shifted = project_years(cs, -shift * 400);
                    let mut cl = self.resolve(shifted, normalized);
                    let offset = shift * SECS_PER_400_YEARS;
                    cl.pre = cl.pre.saturating_add_second(offset);
                    cl.trans = cl.trans.saturating_add_second(offset);
                    cl.post = cl.post.saturating_add_second(offset);
                    return cl;
                }
                return make_unique(
                    tr.unix_time + (cs - tr.civil),
                    normalized,
                );
            }
            // tr.civil <= cs <= tr.prev_civil
            return make_repeated(tr, cs, normalized);
        }

        let tr = &self.transitions[index];
        if tr.prev_civil < cs {
            // tr.prev_civil < cs < tr.civil
            return make_skipped(tr, cs, normalized);
        }
        let tr = &self.transitions[index - 1];
        if cs <= tr.prev_civil {
            // tr.civil <= cs <= tr.prev_civil
            return make_repeated(tr, cs, normalized);
        }
        // In between transitions.
        make_unique(tr.unix_time + (cs - tr.civil), normalized)
    }
}

fn make_unique(unix_time: i64, normalized: bool) -> CivilLookup {
    let instant = Instant::from_second(unix_time);
    CivilLookup {
        kind: CivilKind::Unique,
        pre: instant,
        trans: instant,
        post: instant,
        normalized,
    }
}

fn make_skipped(
    tr: &Transition,
    cs: CivilSecond,
    normalized: bool,
) -> CivilLookup {
    CivilLookup {
        kind: CivilKind::Skipped,
        pre: Instant::from_second(tr.unix_time - 1 + (cs - tr.prev_civil)),
        trans: Instant::from_second(tr.unix_time),
        post: Instant::from_second(tr.unix_time - (tr.civil - cs)),
        normalized,
    }
}

fn make_repeated(
    tr: &Transition,
    cs: CivilSecond,
    normalized: bool,
) -> CivilLookup {
    CivilLookup {
        kind: CivilKind::Repeated,
        pre: Instant::from_second(tr.unix_time - 1 - (tr.prev_civil - cs)),
        trans: Instant::from_second(tr.unix_time),
        post: Instant::from_second(tr.unix_time + (cs - tr.civil)),
        normalized,
    }
}

/// Adds whole years to a civil second, saturating at the `i32` year
/// boundaries.
fn project_years(cs: CivilSecond, years: i64) -> CivilSecond {
    let year = i64::from(cs.year()) + years;
    if year > i64::from(i32::MAX) {
        return CivilSecond::MAX;
    }
    if year < i64::from(i32::MIN) {
        return CivilSecond::MIN;
    }
    CivilSecond::new(
        year as i32,
        cs.month(),
        cs.day(),
        cs.hour(),
        cs.minute(),
        cs.second(),
    )
}

/// The year-relative second of a POSIX transition: seconds from the
/// local January 1 midnight of a year with the given leapness and
/// January 1 weekday (0 = Sunday).
fn trans_offset(
    leap_year: bool,
    jan1_weekday: i64,
    pt: &PosixTransition,
) -> i64 {
    let leap = usize::from(leap_year);
    let days = match pt.date {
        TransitionDate::Julian { day } => {
            let mut days = i64::from(day);
            // Jn never counts February 29.
            if !leap_year || days < MONTH_OFFSETS[1][3] {
                days -= 1;
            }
            days
        }
        TransitionDate::Ordinal { day } => i64::from(day),
        TransitionDate::WeekdayOfMonth { month, week, weekday } => {
            let last_week = week == 5;
            let mut days =
                MONTH_OFFSETS[leap][month as usize + usize::from(last_week)];
            let wd = (jan1_weekday + days) % 7;
            if last_week {
                days -= (wd + 7 - 1 - i64::from(weekday)) % 7 + 1;
            } else {
                days += (i64::from(weekday) + 7 - wd) % 7;
                days += i64::from(week - 1) * 7;
            }
            days
        }
    };
    days * SECS_PER_DAY + i64::from(pt.time_offset)
}

/// The fixed-size header that appears before each TZif data block.
#[derive(Debug)]
struct Header {
    /// 4 for the legacy block, 8 for the 64-bit block.
    time_size: usize,
    /// 0 for version 1, otherwise the ASCII version digit minus `'0'`
    /// is irrelevant here; any non-zero byte means v2+.
    version: u8,
    tzh_ttisutcnt: usize,
    tzh_ttisstdcnt: usize,
    tzh_leapcnt: usize,
    tzh_timecnt: usize,
    tzh_typecnt: usize,
    tzh_charcnt: usize,
}

impl Header {
    fn parse(time_size: usize, bytes: &[u8]) -> Result<(Header, &[u8]), Error> {
        assert!(time_size == 4 || time_size == 8);
        if bytes.len() < 44 {
            return Err(err!("TZif header requires 44 bytes"));
        }
        let (magic, rest) = bytes.split_at(4);
        if magic != b"TZif" {
            return Err(err!("TZif magic bytes not found"));
        }
        let (version, rest) = rest.split_at(1);
        let (_reserved, rest) = rest.split_at(15);
        let (tzh_ttisutcnt, rest) = read_count(rest)?;
        let (tzh_ttisstdcnt, rest) = read_count(rest)?;
        let (tzh_leapcnt, rest) = read_count(rest)?;
        let (tzh_timecnt, rest) = read_count(rest)?;
        let (tzh_typecnt, rest) = read_count(rest)?;
        let (tzh_charcnt, rest) = read_count(rest)?;
        if tzh_ttisutcnt != 0 && tzh_ttisutcnt != tzh_typecnt {
            return Err(err!(
                "UT/local indicator count must be 0 or match the \
                 local time type count",
            ));
        }
        if tzh_ttisstdcnt != 0 && tzh_ttisstdcnt != tzh_typecnt {
            return Err(err!(
                "standard/wall indicator count must be 0 or match the \
                 local time type count",
            ));
        }
        if tzh_typecnt < 1 {
            return Err(err!("TZif data must have at least one time type"));
        }
        if tzh_charcnt < 1 {
            return Err(err!(
                "TZif data must have at least one abbreviation byte",
            ));
        }
        let header = Header {
            time_size,
            version: version[0],
            tzh_ttisutcnt,
            tzh_ttisstdcnt,
            tzh_leapcnt,
            tzh_timecnt,
            tzh_typecnt,
            tzh_charcnt,
        };
        Ok((header, rest))
    }

    /// The size in bytes of the data block this header describes. Used
    /// to skip the legacy 32-bit block.
    fn data_block_len(&self) -> Result<usize, Error> {
        let a = self.transition_times_len()?;
        let b = self.tzh_timecnt;
        let c = self.local_time_types_len()?;
        let d = self.tzh_charcnt;
        let e = self.leap_second_len()?;
        let f = self.tzh_ttisstdcnt;
        let g = self.tzh_ttisutcnt;
        a.checked_add(b)
            .and_then(|z| z.checked_add(c))
            .and_then(|z| z.checked_add(d))
            .and_then(|z| z.checked_add(e))
            .and_then(|z| z.checked_add(f))
            .and_then(|z| z.checked_add(g))
            .ok_or_else(|| err!("TZif data block length overflows"))
    }

    fn transition_times_len(&self) -> Result<usize, Error> {
        self.tzh_timecnt
            .checked_mul(self.time_size)
            .ok_or_else(|| err!("TZif transition time count is too big"))
    }

    fn local_time_types_len(&self) -> Result<usize, Error> {
        self.tzh_typecnt
            .checked_mul(6)
            .ok_or_else(|| err!("TZif local time type count is too big"))
    }

    fn leap_second_len(&self) -> Result<usize, Error> {
        self.tzh_leapcnt
            .checked_mul(self.time_size + 4)
            .ok_or_else(|| err!("TZif leap second count is too big"))
    }
}

fn read_count(bytes: &[u8]) -> Result<(usize, &[u8]), Error> {
    let (count, rest) = bytes.split_at(4);
    let count = u32::from_be_bytes(count.try_into().unwrap());
    let count = usize::try_from(count)
        .map_err(|_| err!("TZif count {count} does not fit in usize"))?;
    Ok((count, rest))
}

fn try_split_at<'b>(
    what: &'static str,
    bytes: &'b [u8],
    at: usize,
) -> Result<(&'b [u8], &'b [u8]), Error> {
    if at > bytes.len() {
        Err(err!(
            "expected {at} bytes for {what}, but only {} remain",
            bytes.len(),
        ))
    } else {
        Ok(bytes.split_at(at))
    }
}

fn from_be_bytes_i32(bytes: &[u8]) -> i32 {
    i32::from_be_bytes(bytes.try_into().unwrap())
}

fn from_be_bytes_i64(bytes: &[u8]) -> i64 {
    i64::from_be_bytes(bytes.try_into().unwrap())
}
