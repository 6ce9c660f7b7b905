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

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{CursorKind, CursorStore, HeaderRecord, HeaderStore};

type HeaderMap = HashMap<String, BTreeMap<u64, HeaderRecord>>;

/// InMemoryStore is a store that keeps the gateway progress in memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    cursors: Arc<RwLock<HashMap<String, u64>>>,
    headers: Arc<RwLock<HeaderMap>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl CursorStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn get_cursor(
        &self,
        chain_rid: &str,
        kind: CursorKind,
    ) -> crate::Result<u64> {
        let guard = self.cursors.read();
        Ok(guard.get(&kind.key(chain_rid)).copied().unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    fn advance_cursor(
        &self,
        chain_rid: &str,
        kind: CursorKind,
        height: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.cursors.write();
        let val = guard.entry(kind.key(chain_rid)).or_default();
        *val = (*val).max(height);
        Ok(*val)
    }
}

impl HeaderStore for InMemoryStore {
    fn insert_headers(
        &self,
        chain_rid: &str,
        headers: &[HeaderRecord],
    ) -> crate::Result<()> {
        let mut guard = self.headers.write();
        let chain = guard.entry(chain_rid.to_owned()).or_default();
        chain.extend(headers.iter().map(|h| (h.height, h.clone())));
        Ok(())
    }

    fn get_header(
        &self,
        chain_rid: &str,
        height: u64,
    ) -> crate::Result<Option<HeaderRecord>> {
        let guard = self.headers.read();
        Ok(guard
            .get(chain_rid)
            .and_then(|chain| chain.get(&height))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_state() {
        let store = InMemoryStore::default();
        let other = store.clone();
        store.advance_cursor("c", CursorKind::Cross, 9).unwrap();
        assert_eq!(other.get_cursor("c", CursorKind::Cross).unwrap(), 9);
        assert_eq!(other.advance_cursor("c", CursorKind::Cross, 3).unwrap(), 9);
    }
}
