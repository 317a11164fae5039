use std::env;

use const_format::concatcp;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const OS: &str = env::consts::OS;
pub const ARCH: &str = env::consts::ARCH;
pub const COMPILER: &str = env!("HASHSERVE_COMPILER");

/// Value of the `Server` response header when none is configured
pub const SERVER_INFO: &str = concatcp!(NAME, "/", VERSION);

// config defaults
pub const LOG_LEVEL_DEFAULT: &str = "info";
pub fn log_level_default() -> String {
    LOG_LEVEL_DEFAULT.to_string()
}

pub const LOG_FOLDER_DEFAULT: &str = "./logs";
pub fn log_folder_default() -> String {
    LOG_FOLDER_DEFAULT.to_string()
}

pub const HOST_IP_DEFAULT: &str = "0.0.0.0";
pub fn host_ip_default() -> String {
    HOST_IP_DEFAULT.to_string()
}

pub const HOST_PORT_DEFAULT: u16 = 8080;
pub fn host_port_default() -> u16 {
    HOST_PORT_DEFAULT
}

/// `Cache-Control: max-age` in seconds
pub const CACHE_MAX_AGE_DEFAULT: u64 = 3600;
pub fn cache_max_age_default() -> u64 {
    CACHE_MAX_AGE_DEFAULT
}

pub fn server_info_default() -> String {
    SERVER_INFO.to_string()
}

pub const TIMEOUT_DEFAULT: u16 = 75;
pub fn timeout_default() -> u16 {
    TIMEOUT_DEFAULT
}

/// Maximum number of fingerprints kept in memory, 0 means unbounded
///
/// Going past it scans every entry once and drops the oldest 1/64.
pub const CACHE_CAPACITY_DEFAULT: usize = 10_000;
pub fn cache_capacity_default() -> usize {
    CACHE_CAPACITY_DEFAULT
}

/// Idle seconds after which a fingerprint is swept, 0 disables the sweeper
pub const CACHE_IDLE_DEFAULT: u64 = 0;
pub fn cache_idle_default() -> u64 {
    CACHE_IDLE_DEFAULT
}

/// Bytes read per chunk while hashing a file
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;
