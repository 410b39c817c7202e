// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection configuration for the Redis-backed store:
//! `REDIS_HOST`/`REDIS_PORT`/`REDIS_PASSWORD`.

use clap::Args;

/// Connection parameters for [`crate::RedisStore`].
#[derive(Debug, Clone, Args)]
pub struct RedisConfig {
    /// Redis host.
    #[arg(long, default_value = "127.0.0.1", env = "REDIS_HOST")]
    pub host: String,

    /// Redis port.
    #[arg(long, default_value_t = 6379, env = "REDIS_PORT")]
    pub port: u16,

    /// Redis password, if auth is enabled on the server.
    #[arg(long, env = "REDIS_PASSWORD")]
    pub password: Option<String>,
}

impl RedisConfig {
    /// Build the `redis://` connection URL this config describes.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{password}@{}:{}", self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
