//! Named process exit codes, matching the BSD `sysexits.h` convention.

pub const OK: i32 = 0;
pub const USAGE: i32 = 64;
pub const SOFTWARE: i32 = 70;
pub const TEMPFAIL: i32 = 75;
