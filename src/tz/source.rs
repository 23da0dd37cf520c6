/*!
Locating and reading the binary zone file for a named zone.

The resolution order is: an absolute path is read as given; the special
name `localtime` reads the path in the `LOCALTIME` environment variable
(default `/etc/localtime`); anything else is joined to the directory in
`TZDIR` (default `/usr/share/zoneinfo`). The environment is consulted
once per load, never cached.

The name `UTC` never reaches this module; the registry synthesizes it in
memory.
*/

use std::path::PathBuf;

use alloc::vec::Vec;

use crate::error::{err, Error};

const ZONEINFO_DEFAULT: &str = "/usr/share/zoneinfo";
const LOCALTIME_DEFAULT: &str = "/etc/localtime";

/// Reads the tzfile bytes for the given zone name.
pub(crate) fn load_zone_bytes(name: &str) -> Result<Vec<u8>, Error> {
    if name.is_empty() {
        return Err(err!("time zone name is empty"));
    }
    if name.contains(':') {
        return Err(err!("time zone name {name:?} contains ':'"));
    }
    let path = if name.starts_with('/') {
        PathBuf::from(name)
    } else if name == "localtime" {
        match std::env::var_os("LOCALTIME") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(LOCALTIME_DEFAULT),
        }
    } else {
        let dir = match std::env::var_os("TZDIR") {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(ZONEINFO_DEFAULT),
        };
        dir.join(name)
    };
    debug!("reading zone {name:?} from {}", path.display());
    std::fs::read(&path)
        .map_err(|e| err!("failed to read {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_fail_without_touching_the_file_system() {
        assert!(load_zone_bytes("").is_err());
        assert!(load_zone_bytes(":America/New_York").is_err());
        assert!(load_zone_bytes("Po:six").is_err());
    }

    #[test]
    fn missing_zone_is_not_found() {
        assert!(load_zone_bytes("Nowhere/Special").is_err());
    }
}
