/*!
The process wide name-to-zone cache.

Loaded zones are immutable and live for the lifetime of the process;
there is no eviction. The first use of the registry, whatever name it is
for, constructs the builtin `UTC` zone, which doubles as the fallback for
every load that fails. Failures are cached permanently: a name that once
failed stays bound to UTC and never re-enters the loader.
*/

use std::{
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

use alloc::string::{String, ToString};

use crate::{
    error::Error,
    tz::{fixed, TimeZone},
};

struct Registry {
    utc: TimeZone,
    zones: RwLock<HashMap<String, Cached>>,
}

#[derive(Clone)]
struct Cached {
    tz: TimeZone,
    /// False when this name is bound to the UTC fallback.
    ok: bool,
}

/// The one-shot guard: the first caller builds the registry (and with it
/// the UTC zone); concurrent callers observe the completed state through
/// the initialization's happens-before edge.
fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(|| {
        let utc = TimeZone::utc_builtin();
        let mut zones = HashMap::new();
        zones.insert(
            String::from("UTC"),
            Cached { tz: utc.clone(), ok: true },
        );
        Registry { utc, zones: RwLock::new(zones) }
    })
}

/// Loads the named zone through the registry.
///
/// On success, returns the zone and `true`. On any failure (bad name,
/// missing file, corrupt data) returns the UTC zone and `false`; the
/// failure is cached, so retrying the same name is cheap and yields the
/// same answer. Asking for `"UTC"` itself returns `true`.
pub fn load_zone(name: &str) -> (TimeZone, bool) {
    let registry = global();
    {
        let zones = registry.zones.read().unwrap();
        if let Some(cached) = zones.get(name) {
            return (cached.tz.clone(), cached.ok);
        }
    }
    // Read the file and decode it outside the write lock; only the
    // install step below re-acquires it.
    let built = build_zone(name);
    let mut zones = registry.zones.write().unwrap();
    let cached = zones.entry(name.to_string()).or_insert_with(|| match built {
        Ok(tz) => Cached { tz, ok: true },
        Err(e) => {
            warn!("failed to load time zone {name:?}: {e}");
            Cached { tz: registry.utc.clone(), ok: false }
        }
    });
    (cached.tz.clone(), cached.ok)
}

/// Returns the builtin UTC zone.
pub fn utc_zone() -> TimeZone {
    global().utc.clone()
}

/// Returns the zone named by the `TZ` environment variable, with a
/// leading `:` stripped. An unset or empty `TZ` means `localtime`.
/// Falls back to UTC like any other load.
pub fn local_zone() -> TimeZone {
    let tz = std::env::var("TZ").unwrap_or_default();
    let tz = tz.strip_prefix(':').unwrap_or(&tz);
    let name = if tz.is_empty() { "localtime" } else { tz };
    load_zone(name).0
}

fn build_zone(name: &str) -> Result<TimeZone, Error> {
    // Fixed-offset names round-trip without touching the file system.
    if let Some(offset) = fixed::offset_from_name(name) {
        return Ok(TimeZone::fixed(offset));
    }
    #[cfg(feature = "tzdb-zoneinfo")]
    {
        let bytes = crate::tz::source::load_zone_bytes(name)?;
        TimeZone::from_tzif(name, &bytes)
    }
    #[cfg(not(feature = "tzdb-zoneinfo"))]
    {
        Err(crate::error::err!(
            "cannot load {name:?}: zoneinfo support is disabled",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_loads_as_itself() {
        let (zone, ok) = load_zone("UTC");
        assert!(ok);
        assert_eq!(zone.name(), "UTC");
    }

    #[test]
    fn failures_fall_back_to_utc() {
        for name in ["", ":America/New_York", "Invalid/Zone"] {
            let (zone, ok) = load_zone(name);
            assert!(!ok, "expected fallback for {name:?}");
            assert_eq!(zone.name(), "UTC");
            // And again, now served from the negative cache.
            let (zone, ok) = load_zone(name);
            assert!(!ok);
            assert_eq!(zone.name(), "UTC");
        }
    }

    #[test]
    fn fixed_names_round_trip() {
        let fixed = TimeZone::fixed(5 * 3600);
        let (zone, ok) = load_zone(fixed.name());
        assert!(ok);
        assert_eq!(zone.name(), "Fixed/UTC+05:00:00");
        let al = zone.breakdown(crate::Instant::UNIX_EPOCH);
        assert_eq!(al.offset, 5 * 3600);
    }

    #[test]
    fn loads_from_a_private_zoneinfo_dir() {
        use crate::tz::tzif::tests::TzifBuilder;
        use std::io::Write;

        // Writes a zone into a throwaway TZDIR and loads it by name.
        // TZDIR is read per load, so this does not disturb other tests
        // beyond the names used here.
        let dir = std::env::temp_dir().join(alloc::format!(
            "zonetime-registry-test-{}",
            std::process::id(),
        ));
        std::fs::create_dir_all(dir.join("Test")).unwrap();
        let mut f =
            std::fs::File::create(dir.join("Test/Los_Angeles")).unwrap();
        f.write_all(&TzifBuilder::los_angeles().build()).unwrap();
        drop(f);

        std::env::set_var("TZDIR", &dir);
        let (zone, ok) = load_zone("Test/Los_Angeles");
        std::env::remove_var("TZDIR");

        assert!(ok);
        let al = zone.breakdown(crate::Instant::from_second(1380855729));
        assert_eq!(al.abbreviation, "PDT");
        assert_eq!(
            al.civil,
            crate::civil::CivilSecond::new(2013, 10, 3, 20, 2, 9),
        );
        assert!(al.is_dst);
        assert_eq!(al.offset, -7 * 3600);

        std::fs::remove_dir_all(&dir).ok();
    }
}
