// ────────────────────────────────────────────────────────────────────────────
// Screening pipeline
//
//   backend fetch ─► identity ─► aggregator ─► classifier ─► ranker ─► cache
//                                                                      │
//   scheduler: owns the dispatch counter and publishes ScreenView ◄────┘
// ────────────────────────────────────────────────────────────────────────────

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod handlers;
pub mod identity;
pub mod ranker;
pub mod scheduler;

#[cfg(test)]
mod test_support;
