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

use std::path::Path;

use crate::{parse_cursor, CursorKind, CursorStore, HeaderRecord, HeaderStore};

/// SledStore is a store that keeps the gateway progress in a [Sled](https://sled.rs)-based database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Opens (or creates) a SledStore at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Creates a temporary SledStore, deleted once the last handle drops.
    pub fn temporary() -> crate::Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Writes every buffered change to disk.
    pub fn flush(&self) -> crate::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn headers_tree(&self, chain_rid: &str) -> crate::Result<sled::Tree> {
        Ok(self.db.open_tree(format!("headers/{chain_rid}"))?)
    }
}

impl CursorStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn get_cursor(
        &self,
        chain_rid: &str,
        kind: CursorKind,
    ) -> crate::Result<u64> {
        match self.db.get(kind.key(chain_rid))? {
            Some(v) => parse_cursor(&v).ok_or(
                tcc_gateway_utils::Error::Generic("corrupted cursor value"),
            ),
            None => Ok(0),
        }
    }

    #[tracing::instrument(skip(self))]
    fn advance_cursor(
        &self,
        chain_rid: &str,
        kind: CursorKind,
        height: u64,
    ) -> crate::Result<u64> {
        let key = kind.key(chain_rid);
        let old = self.db.fetch_and_update(&key, |old| {
            let current = old.and_then(parse_cursor).unwrap_or(0);
            let next = current.max(height);
            Some(next.to_string().into_bytes())
        })?;
        // the relay ack is only considered complete once this is on disk.
        self.db.flush()?;
        let previous = old.as_deref().and_then(parse_cursor).unwrap_or(0);
        Ok(previous.max(height))
    }
}

impl HeaderStore for SledStore {
    #[tracing::instrument(skip(self, headers), fields(count = headers.len()))]
    fn insert_headers(
        &self,
        chain_rid: &str,
        headers: &[HeaderRecord],
    ) -> crate::Result<()> {
        let tree = self.headers_tree(chain_rid)?;
        let mut batch = sled::Batch::default();
        for header in headers {
            batch.insert(
                header.height.to_be_bytes().to_vec(),
                serde_json::to_vec(header)?,
            );
        }
        tree.apply_batch(batch)?;
        tree.flush()?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn get_header(
        &self,
        chain_rid: &str,
        height: u64,
    ) -> crate::Result<Option<HeaderRecord>> {
        let tree = self.headers_tree(chain_rid)?;
        match tree.get(height.to_be_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }
}
