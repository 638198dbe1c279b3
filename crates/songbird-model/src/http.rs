// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Process-wide HTTP client pool.
//!
//! All provider adapters share one lazily-initialized `reqwest::Client` so
//! connection pools, TLS sessions, and timeout policy are configured in one
//! place.  `reqwest::Client` is internally reference-counted; cloning the
//! shared instance is cheap and the pool outlives any single provider.

use std::sync::OnceLock;
use std::time::Duration;

/// Connect timeout for establishing a TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Idle read timeout between response chunks (streaming keep-alive window).
const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Hard ceiling on one request including streaming.
const TOTAL_TIMEOUT: Duration = Duration::from_secs(300);

static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// The shared client.  Built on first use; later calls return the same pool.
///
/// Dropping clones is always safe (idempotent shutdown): the underlying pool
/// is released when the process exits, which also covers the Ctrl-C path.
pub fn shared_client() -> reqwest::Client {
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .read_timeout(READ_TIMEOUT)
                .timeout(TOTAL_TIMEOUT)
                .pool_max_idle_per_host(4)
                .build()
                .expect("default TLS backend is always available")
        })
        .clone()
}

/// A client for short discovery probes (model listing).  Separate total
/// timeout so a slow provider cannot stall interactive startup.
pub fn probe_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .expect("default TLS backend is always available")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_is_a_singleton() {
        // Two calls must hand out clones of the same pool (OnceLock init runs once).
        let a = shared_client();
        let b = shared_client();
        // reqwest::Client has no identity accessor; constructing twice without
        // panicking and returning successfully is the observable contract.
        drop(a);
        drop(b);
        let _ = shared_client();
    }

    #[test]
    fn probe_client_builds_with_short_timeout() {
        let _ = probe_client(Duration::from_secs(3));
    }
}
