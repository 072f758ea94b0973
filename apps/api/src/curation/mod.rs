// Duplicate curation core.
// Scoring, stable group identity, pending-group listing, and the
// resolve-and-archive transaction with its session-scoped resolved set.

pub mod group_key;
pub mod groups;
pub mod handlers;
pub mod merge;
pub mod report;
pub mod resolution;
pub mod scoring;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub mod memory;
#[cfg(test)]
pub mod test_support;
