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

/// Relay calls and cross-chain requests time out after `10` seconds by default.
pub const fn default_timeout() -> u64 {
    10
}
/// The inbound server listens on `19996` by default.
pub const fn rpc_port() -> u16 {
    19996
}
/// Requests larger than `10 MiB` are refused by default.
pub const fn max_request_size() -> usize {
    10 * 1024 * 1024
}
/// Failed relay calls are retried every `5_000` ms by default.
pub const fn retry_interval() -> u64 {
    5_000
}
/// Headers are synchronized every `10` seconds by default.
pub const fn header_sync_interval() -> u64 {
    10
}
/// At most `50` headers per relay call by default.
pub const fn header_batch_count() -> u64 {
    50
}
/// Dispatch queue capacity.
pub const fn dispatch_queue_size() -> usize {
    1024
}
/// Concurrent relay calls.
pub const fn dispatch_max_in_flight() -> usize {
    64
}
/// Chains are polled for logs every `3_000` ms by default.
pub const fn polling_interval() -> u64 {
    3_000
}
/// The maximum blocks scanned per log query is set to `500` by default.
pub const fn max_blocks_per_step() -> u64 {
    500
}
