// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retry policies for async calls.
//!
//! Two shapes are used across the gateway: a bounded one for chain reads
//! that may race the node's indexer, and an unbounded one for relay
//! delivery, which must eventually succeed.

use std::time::Duration;

use backoff::backoff::Backoff;

/// Waits a constant interval between attempts and gives up after
/// `max_retry_count` retries.
#[derive(Debug, Clone)]
pub struct ConstantWithMaxRetryCount {
    interval: Duration,
    max_retry_count: usize,
    count: usize,
}

impl ConstantWithMaxRetryCount {
    /// Creates a new bounded constant backoff.
    pub fn new(interval: Duration, max_retry_count: usize) -> Self {
        Self {
            interval,
            max_retry_count,
            count: 0,
        }
    }
}

impl Backoff for ConstantWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.count >= self.max_retry_count {
            return None;
        }
        self.count += 1;
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Waits a fixed interval between attempts, forever.
///
/// The only way out of a retry loop driven by this policy is a permanent
/// error returned by the operation itself.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    attempts: u64,
}

impl FixedInterval {
    /// Creates a new unbounded fixed-interval backoff.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            attempts: 0,
        }
    }

    /// How many retries were scheduled so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl Backoff for FixedInterval {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}
