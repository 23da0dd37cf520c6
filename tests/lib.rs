/*!
End to end tests against the public API: the zone registry (driven
through a scratch `TZDIR`), both lookup directions, and the
formatter/parser round trip.
*/

use std::io::Write;
use std::path::PathBuf;

use zonetime::{
    civil::CivilSecond, fixed_zone, format, load_zone, parse, tz::CivilKind,
    utc_zone, Instant,
};

/// Serializes a TZif v2 image the way zic lays one out: a 32-bit block
/// with clamped timestamps, the same data again in 64 bits, and a
/// newline bracketed POSIX rule.
struct TzifImage {
    transitions: Vec<(i64, u8)>,
    types: Vec<(i32, bool, u8)>,
    designations: &'static [u8],
    tail: &'static str,
}

impl TzifImage {
    fn los_angeles() -> TzifImage {
        TzifImage {
            transitions: vec![
                (1300010400, 1), // 2011-03-13 to PDT
                (1320570000, 0), // 2011-11-06 to PST
                (1331460000, 1),
                (1352019600, 0),
                (1362909600, 1),
                (1383469200, 0), // 2013-11-03 to PST
            ],
            types: vec![(-28800, false, 0), (-25200, true, 4)],
            designations: b"PST\0PDT\0",
            tail: "PST8PDT,M3.2.0,M11.1.0",
        }
    }

    fn section(&self, time_size: usize, out: &mut Vec<u8>) {
        out.extend_from_slice(b"TZif2");
        out.extend_from_slice(&[0; 15]);
        for count in [
            0u32,
            0u32,
            0u32,
            self.transitions.len() as u32,
            self.types.len() as u32,
            self.designations.len() as u32,
        ] {
            out.extend_from_slice(&count.to_be_bytes());
        }
        for &(unix_time, _) in self.transitions.iter() {
            if time_size == 4 {
                let clamped = unix_time
                    .clamp(i64::from(i32::MIN), i64::from(i32::MAX))
                    as i32;
                out.extend_from_slice(&clamped.to_be_bytes());
            } else {
                out.extend_from_slice(&unix_time.to_be_bytes());
            }
        }
        for &(_, type_index) in self.transitions.iter() {
            out.push(type_index);
        }
        for &(offset, is_dst, abbr_index) in self.types.iter() {
            out.extend_from_slice(&offset.to_be_bytes());
            out.push(u8::from(is_dst));
            out.push(abbr_index);
        }
        out.extend_from_slice(self.designations);
    }

    fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.section(4, &mut out);
        self.section(8, &mut out);
        out.push(b'\n');
        out.extend_from_slice(self.tail.as_bytes());
        out.push(b'\n');
        out
    }
}

/// Creates a scratch zoneinfo directory holding our test zone and
/// points `TZDIR` at it. Loads are cached forever, so doing this more
/// than once per process is harmless.
fn setup_tzdir() -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("zonetime-it-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("Test")).unwrap();
    let path = dir.join("Test/Los_Angeles");
    if !path.exists() {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&TzifImage::los_angeles().build()).unwrap();
    }
    std::env::set_var("TZDIR", &dir);
    dir
}

#[test]
fn utc_fallback_contract() {
    for name in ["", ":anything", "Invalid/Zone"] {
        let (zone, ok) = load_zone(name);
        assert!(!ok, "{name:?} should fall back");
        assert_eq!(zone.name(), "UTC");
    }
    let (zone, ok) = load_zone("UTC");
    assert!(ok);
    assert_eq!(zone.name(), "UTC");
}

#[test]
fn epoch_in_utc() {
    let zone = utc_zone();
    let lookup = zone.breakdown(Instant::UNIX_EPOCH);
    assert_eq!(lookup.civil, CivilSecond::new(1970, 1, 1, 0, 0, 0));
    assert_eq!(lookup.offset, 0);
    assert!(!lookup.is_dst);
    assert_eq!(lookup.abbreviation, "UTC");
    assert_eq!(lookup.yearday, 1);
    assert_eq!(lookup.weekday.number_from_monday(), 4); // Thursday
}

#[test]
fn loaded_zone_answers_the_documented_scenarios() {
    setup_tzdir();
    let (zone, ok) = load_zone("Test/Los_Angeles");
    assert!(ok);

    let lookup = zone.breakdown(Instant::from_second(1380855729));
    assert_eq!(lookup.civil, CivilSecond::new(2013, 10, 3, 20, 2, 9));
    assert_eq!(lookup.offset, -7 * 3600);
    assert!(lookup.is_dst);
    assert_eq!(lookup.abbreviation, "PDT");
    assert_eq!(lookup.weekday.number_from_monday(), 4); // Thursday

    let skipped = zone.resolve(CivilSecond::new(2011, 3, 13, 2, 15, 0));
    assert_eq!(skipped.kind, CivilKind::Skipped);
    assert_eq!(
        zone.breakdown(skipped.pre).civil,
        CivilSecond::new(2011, 3, 13, 3, 15, 0),
    );
    assert_eq!(
        zone.breakdown(skipped.trans).civil,
        CivilSecond::new(2011, 3, 13, 3, 0, 0),
    );
    assert_eq!(
        zone.breakdown(skipped.post).civil,
        CivilSecond::new(2011, 3, 13, 1, 15, 0),
    );

    let repeated = zone.resolve(CivilSecond::new(2011, 11, 6, 1, 15, 0));
    assert_eq!(repeated.kind, CivilKind::Repeated);
    let pre = zone.breakdown(repeated.pre);
    assert_eq!(pre.civil, CivilSecond::new(2011, 11, 6, 1, 15, 0));
    assert_eq!(pre.offset, -7 * 3600);
    let post = zone.breakdown(repeated.post);
    assert_eq!(post.civil, CivilSecond::new(2011, 11, 6, 1, 15, 0));
    assert_eq!(post.offset, -8 * 3600);
}

#[test]
fn unique_times_round_trip() {
    setup_tzdir();
    let (zone, ok) = load_zone("Test/Los_Angeles");
    assert!(ok);
    // March through several years (DST boundaries included) an hour at
    // a time; every unique civil time must map back to its instant.
    let mut unix_time = 1293840000; // 2011-01-01T00:00:00Z
    while unix_time < 1420070400 {
        let lookup = zone.breakdown(Instant::from_second(unix_time));
        let resolved = zone.resolve(lookup.civil);
        if resolved.kind == CivilKind::Unique {
            assert_eq!(resolved.pre.as_second(), unix_time);
        }
        unix_time += 3599; // a non-divisor stride hits odd minutes too
    }
}

#[test]
fn format_parse_round_trip() {
    setup_tzdir();
    let (zone, ok) = load_zone("Test/Los_Angeles");
    assert!(ok);
    const PATTERN: &str = "%Y-%m-%dT%H:%M:%E*S%Ez";
    for &second in &[
        0i64,
        1300010399, // last PST second before the 2011 spring gap
        1300010400,
        1320569999, // last PDT second of the 2011 fall overlap
        1320570000,
        1380855729,
        1394359200, // first synthesized transition
        2000000000,
    ] {
        for &nanos in &[0, 6_000_000, 123_456_789] {
            let instant = Instant::new(second, nanos);
            let rendered = format(PATTERN, instant, &zone);
            let parsed = parse(PATTERN, &rendered, &zone)
                .unwrap_or_else(|e| panic!("{rendered}: {e}"));
            assert_eq!(parsed, instant, "via {rendered}");
        }
    }
}

#[test]
fn formatted_fraction_from_spec_table() {
    let zone = utc_zone();
    let instant = Instant::new(0, 6_000_000);
    assert_eq!(
        format("%Y-%m-%d %H:%M:%E3S %Ez", instant, &zone),
        "1970-01-01 00:00:00.006 +00:00",
    );
    let parsed = parse(
        "%Y-%m-%dT%H:%M:%SZ",
        "2014-02-12T20:21:00Z",
        &zone,
    );
    // A literal Z matches byte-for-byte.
    assert_eq!(
        zone.breakdown(parsed.unwrap()).civil,
        CivilSecond::new(2014, 2, 12, 20, 21, 0),
    );
}

#[test]
fn concurrent_loads_agree() {
    setup_tzdir();
    let names = [
        "Test/Los_Angeles",
        "UTC",
        "Fixed/UTC+05:30:00",
        "Invalid/Zone",
    ];
    let handles: Vec<_> = (0..16)
        .map(|_| {
            std::thread::spawn(move || {
                names
                    .iter()
                    .map(|name| {
                        let (zone, ok) = load_zone(name);
                        let lookup =
                            zone.breakdown(Instant::from_second(1380855729));
                        (ok, lookup.offset, String::from(lookup.abbreviation))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut all = handles.into_iter().map(|h| h.join().unwrap());
    let first = all.next().unwrap();
    // Every thread observes byte-identical answers.
    for other in all {
        assert_eq!(first, other);
    }
    assert_eq!(first[0], (true, -7 * 3600, String::from("PDT")));
    assert_eq!(first[1], (true, 0, String::from("UTC")));
    assert_eq!(first[2], (true, 19800, String::from("UTC+05:30")));
    assert_eq!(first[3], (false, 0, String::from("UTC")));
}

#[test]
fn fixed_zones_cover_the_offset_range() {
    for &offset in &[-86400, -3600, -93, 0, 93, 3600, 19800, 86400] {
        let zone = fixed_zone(offset);
        let lookup = zone.breakdown(Instant::UNIX_EPOCH);
        assert_eq!(lookup.offset, offset);
        let back = zone.resolve(lookup.civil);
        assert_eq!(back.kind, CivilKind::Unique);
        assert_eq!(back.pre, Instant::UNIX_EPOCH);
    }
    // Out of range collapses to UTC.
    assert_eq!(fixed_zone(86401).name(), "UTC");
}
