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

#![warn(missing_docs)]
//! # Gateway Store Module 🕸️
//!
//! A module for managing the storage of the gateway.
//!
//! ## Overview
//!
//! The store keeps, per chain, two monotonically non-decreasing progress
//! cursors (the last block header height acknowledged by the relay and the
//! last height whose cross-chain event was acknowledged), and the header
//! records used to verify proofs locally.
//!
//! Cursor keys are plain strings of the form
//! `"{chainRid}_last_block_header_height"` and `"{chainRid}_last_cross_height"`,
//! values are decimal strings. An absent key reads as `0`.
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
pub use tcc_gateway_utils::Result;

/// A module for managing in-memory storage of the gateway.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
pub mod sled;

/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;
/// A store that uses [`sled`](https://sled.rs) as the backend.
pub use self::sled::SledStore;

/// The two progress markers tracked for every chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    /// Highest block header height acknowledged by the relay.
    BlockHeader,
    /// Height of the last cross-chain event acknowledged by the relay.
    Cross,
}

impl CursorKind {
    /// The storage key of this cursor for the given chain.
    pub fn key(&self, chain_rid: &str) -> String {
        match self {
            CursorKind::BlockHeader => {
                format!("{chain_rid}_last_block_header_height")
            }
            CursorKind::Cross => format!("{chain_rid}_last_cross_height"),
        }
    }
}

/// Per-chain progress cursors.
///
/// Implementations must only ever move a cursor forward, and must have the
/// new value durable by the time [`CursorStore::advance_cursor`] returns.
pub trait CursorStore: Send + Sync + Debug {
    /// Reads a cursor, `0` if it was never written.
    fn get_cursor(&self, chain_rid: &str, kind: CursorKind) -> Result<u64>;

    /// Moves a cursor to `height` unless it is already further.
    ///
    /// Returns the value stored after the call.
    fn advance_cursor(
        &self,
        chain_rid: &str,
        kind: CursorKind,
        height: u64,
    ) -> Result<u64>;
}

/// A block header as remembered by the gateway, used to check proofs
/// without asking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRecord {
    /// Block height.
    pub height: u64,
    /// Block hash, `0x` prefixed hex.
    pub hash: String,
    /// Hashes of the transactions included in the block.
    pub tx_ids: Vec<String>,
}

/// Locally kept header chain, one per chain.
pub trait HeaderStore: Send + Sync + Debug {
    /// Inserts (or replaces) the given header records.
    fn insert_headers(
        &self,
        chain_rid: &str,
        headers: &[HeaderRecord],
    ) -> Result<()>;

    /// Returns the header record at `height`, if it was synchronized.
    fn get_header(
        &self,
        chain_rid: &str,
        height: u64,
    ) -> Result<Option<HeaderRecord>>;
}

pub(crate) fn parse_cursor(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}
