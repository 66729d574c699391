use std::fmt;
use std::str::FromStr;

use crate::error::ServerError;

/// Which rate limiter backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitProvider {
    InMemory,
    Redis,
}

/// Which file repository backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryProvider {
    InMemory,
    Postgres,
}

/// Which file storage backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    Local,
    Aws,
    Azure,
    Gcp,
}

fn unsupported(kind: &'static str, value: &str) -> ServerError {
    ServerError::UnsupportedProvider {
        kind,
        value: value.to_owned(),
    }
}

impl FromStr for RateLimitProvider {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            _ => Err(unsupported("rate limit", s)),
        }
    }
}

impl FromStr for RepositoryProvider {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "database" => Ok(Self::Postgres),
            _ => Err(unsupported("repository", s)),
        }
    }
}

impl FromStr for StorageProvider {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "aws" | "amazon" => Ok(Self::Aws),
            "az" | "azure" | "microsoft" => Ok(Self::Azure),
            "gcp" | "google" => Ok(Self::Gcp),
            _ => Err(unsupported("storage", s)),
        }
    }
}

impl fmt::Display for RateLimitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InMemory => "in-memory",
            Self::Redis => "redis",
        })
    }
}

impl fmt::Display for RepositoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InMemory => "in-memory",
            Self::Postgres => "postgres",
        })
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        })
    }
}

/// Backend selectors resolved by [`RelayConfig::validate`](super::RelayConfig::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Providers {
    pub rate_limit: RateLimitProvider,
    pub repository: RepositoryProvider,
    pub storage: StorageProvider,
}
