/*!
Conversion between absolute time and civil time under the rules of an
IANA time zone, plus a `strftime`-style formatter and parser.

Three ideas, three types:

* An [`Instant`] is a point on the absolute time line: a count of
  seconds from the Unix epoch, with no zone attached.
* A [`civil::CivilSecond`] is a wall clock reading: the six field tuple
  year/month/day/hour/minute/second in the proleptic Gregorian calendar,
  with no zone attached.
* A [`TimeZone`] is the rule, identified by an IANA name such as
  `America/Los_Angeles`, that maps each to the other.

The mapping is not one to one: daylight saving transitions skip some
civil times and repeat others, which is why
[`TimeZone::resolve`](crate::tz::TimeZone::resolve) classifies its answer
instead of pretending otherwise.

# Example

```
use zonetime::{civil::CivilSecond, fixed_zone, format, parse, Instant};

let zone = fixed_zone(-8 * 60 * 60);
let lookup = zone.resolve(CivilSecond::new(2013, 10, 3, 20, 2, 9));
let instant = lookup.pre;
assert_eq!(
    format("%Y-%m-%d %H:%M:%S %Ez", instant, &zone),
    "2013-10-03 20:02:09 -08:00",
);
assert_eq!(
    parse("%Y-%m-%d %H:%M:%S %Ez", "2013-10-03 20:02:09 -08:00", &zone)?,
    instant,
);
# Ok::<(), zonetime::Error>(())
```

Named zones come from the system zoneinfo database through a process
wide registry (requires the default `std` and `tzdb-zoneinfo` features):

```no_run
let (zone, ok) = zonetime::load_zone("America/Los_Angeles");
assert!(ok);
let lookup = zone.breakdown(zonetime::Instant::from_second(1380855729));
assert_eq!(lookup.abbreviation, "PDT");
```

A load that fails for any reason (unknown name, corrupt data) returns
the UTC zone and `false`, so downstream code always holds a working
zone.

Leap seconds do not exist here: minutes have sixty seconds universally,
and leap-second encoded ("right/") zoneinfo data is rejected.
*/

#![no_std]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_debug_implementations)]

#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

pub use crate::{
    error::Error,
    fmt::{format, parse},
    instant::Instant,
    tz::{fixed_zone, TimeZone},
};

#[cfg(feature = "std")]
pub use crate::tz::{load_zone, local_zone, utc_zone};

#[macro_use]
mod logging;

pub mod civil;
mod error;
pub mod fmt;
mod instant;
pub mod tz;
