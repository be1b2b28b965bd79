//! Changed files from the local repository, for runs outside a pull request

use anyhow::{Context, Result};
use git2::{DiffOptions, Repository, StatusOptions};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

pub struct LocalChanges {
    repo: Repository,
}

impl LocalChanges {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to find git repository at {}", path.display()))?;

        Ok(Self { repo })
    }

    /// Files changed between `base_ref` and HEAD plus uncommitted ones, sorted
    pub fn changed_files(&self, base_ref: &str) -> Result<Vec<String>> {
        let mut files: BTreeSet<String> = BTreeSet::new();
        files.extend(self.committed_since(base_ref)?);
        files.extend(self.uncommitted()?);

        debug!("{} file(s) changed since {}", files.len(), base_ref);
        Ok(files.into_iter().collect())
    }

    /// Staged, unstaged and untracked files
    pub fn uncommitted(&self) -> Result<Vec<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        opts.recurse_untracked_dirs(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(|p| p.to_string()))
            .collect())
    }

    fn committed_since(&self, base_ref: &str) -> Result<Vec<String>> {
        let mut files: BTreeSet<String> = BTreeSet::new();

        let base = self
            .repo
            .revparse_single(base_ref)
            .with_context(|| format!("Failed to resolve reference: {}", base_ref))?;
        let old_tree = base.peel_to_commit()?.tree()?;
        let new_tree = self.repo.head()?.peel_to_commit()?.tree()?;

        let mut diff_opts = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;

        diff.foreach(
            &mut |delta, _| {
                // deleted files have no coverage left to report
                if let Some(path) = delta.new_file().path() {
                    if delta.status() != git2::Delta::Deleted {
                        files.insert(path.to_string_lossy().to_string());
                    }
                }
                true
            },
            None,
            None,
            None,
        )?;

        Ok(files.into_iter().collect())
    }
}
