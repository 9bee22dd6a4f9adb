use crate::models::ContributorStats;

/// Length of the ranked list when at least this many contributors exist.
pub const TOP_N: usize = 10;

/// Orders contributors by `total_count` descending. Equal totals are ordered
/// by identity ascending (byte-wise), so output never depends on map order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker;

impl Ranker {
    pub fn rank(&self, contributors: impl IntoIterator<Item = ContributorStats>) -> Vec<ContributorStats> {
        let mut ranked: Vec<_> = contributors.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.total_count
                .cmp(&a.total_count)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        ranked.truncate(TOP_N);
        ranked
    }
}
