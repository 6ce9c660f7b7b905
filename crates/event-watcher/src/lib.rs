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
//! # Event Watcher 🕸️
//!
//! The outbound half of the gateway.
//!
//! ## Overview
//!
//! * [`ChainEventWatcher`] streams the `CROSS_CHAIN_TRIGGER` logs of one
//!   contract, turns each of them into a cross-chain request and hands it to
//!   the dispatch queue.
//! * [`BlockHeaderSynchronizer`] ships the block headers of every chain to
//!   the relay in contiguous batches, so the relay can check the proofs the
//!   gateway attaches to its requests.
//! * [`CrossChainRequestBuilder`] is the pure step in between: decode,
//!   validate and complete the request template carried by a log.

/// Decoding and completion of request templates.
pub mod request_builder;
/// Batched block header synchronization.
pub mod synchronizer;
/// Contract log ingestion.
pub mod watcher;

pub use request_builder::CrossChainRequestBuilder;
pub use synchronizer::{plan_batches, BlockHeaderSynchronizer};
pub use watcher::{trigger_topic, ChainEventWatcher};
