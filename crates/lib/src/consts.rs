/// Length of the truncated SHA-256 used for object hashes.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Environment variable overriding the output root.
pub const OUT_DIR_ENV: &str = "KILN_OUT";
pub const DEFAULT_OUT_DIR: &str = "kiln-out";

pub const FLAVOR_SEPARATOR: char = '#';
pub const CLASS_ABI_FLAVOR: &str = "class-abi";
pub const SOURCE_ABI_FLAVOR: &str = "source-abi";
pub const VERIFIED_SOURCE_ABI_FLAVOR: &str = "verified-source-abi";
