// SPDX-License-Identifier: Apache-2.0

mod cache;
mod retriever;

pub use cache::{CacheOutcome, GraphCache};
pub use retriever::GraphRetriever;
