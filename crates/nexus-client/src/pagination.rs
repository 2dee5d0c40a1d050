// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Deserialize;

/// Totals reported alongside every list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub total_count: u64,
    /// Set when the indexer stopped counting, in which case `total_count` is a lower bound.
    #[serde(default)]
    pub is_total_count_clipped: bool,
}

/// A list response that can be walked with `limit`/`offset`.
pub trait Paged {
    type Item;

    fn page_info(&self) -> &PageInfo;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Whether another page should be requested after one of `page_len` items, with `fetched`
/// items received in total.
///
/// A short page always ends the walk. A full page continues it when the total is clipped,
/// or when the total says more items exist.
pub fn has_more_pages(page_len: usize, limit: u64, fetched: usize, info: &PageInfo) -> bool {
    limit > 0
        && page_len as u64 == limit
        && (info.is_total_count_clipped || info.total_count > fetched as u64)
}
