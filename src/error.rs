use std::{io, net::AddrParseError};

use http::header::{InvalidHeaderName, InvalidHeaderValue};

#[allow(clippy::enum_variant_names)]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // from
    #[error("failed io {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode toml {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to parse listen address {0}")]
    AddrParse(#[from] AddrParseError),
    #[error("invalid header name {0}")]
    HeaderName(#[from] InvalidHeaderName),
    #[error("invalid header value {0}")]
    HeaderValue(#[from] InvalidHeaderValue),
    #[error("no such file or directory: {0}")]
    RootNotFound(String),
    #[error("internal server error {0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = anyhow::Result<T, E>;
