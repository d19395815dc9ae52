// SPDX-License-Identifier: MIT

//! Path is an opaque string key, compared only by equality (spec §3).

use std::sync::Arc;

/// A coordination-store path. Newtyping this buys nothing the spec asks
/// for — paths are compared only by equality and never parsed — so it
/// stays a plain owned `String` key, matching how the daemon keys its
/// session/job maps by plain `String` ids where no extra validation
/// applies.
pub type NodePath = String;

/// `child_name -> mapped_path`, pure. Shared across `fetch_directory_values`
/// calls and the dispatch-thread update path, hence `Arc` rather than `Box`.
pub type PathMapper = Arc<dyn Fn(&str) -> NodePath + Send + Sync>;
