use crate::git::RepoSnapshot;

pub fn snapshot(branches: &[&str], tags: &[&str], commit_count: u64) -> RepoSnapshot {
    RepoSnapshot {
        branches: branches.iter().map(|s| s.to_string()).collect(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        commit_count,
    }
}
