use std::collections::BTreeSet;

use tracing::debug;

use crate::{error::SyncResult, jobs::SyncContext, models::EntityKind};

/// External ids from one walk of the change feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_delete: BTreeSet<i32>,
    pub to_update: BTreeSet<i32>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks the change feed for `kind` from page 1 until a page comes back empty
/// or the provider's `total_pages` is reached.
///
/// `adult == null` marks a removal, `adult == false` an update, and
/// `adult == true` entries are dropped from both sets.
pub async fn scan(ctx: &SyncContext, kind: EntityKind) -> SyncResult<ChangeSet> {
    let mut changes = ChangeSet::default();
    let mut page = 1;

    loop {
        let resp = ctx
            .retry
            .call("changes page", || ctx.source.changes_page(kind, page))
            .await?;

        debug!(kind = kind.as_path(), page, results = resp.results.len(), total_pages = resp.total_pages, "scanned changes page");

        if resp.results.is_empty() {
            break;
        }

        for entry in resp.results {
            match entry.adult {
                None => {
                    changes.to_delete.insert(entry.id);
                },
                Some(false) => {
                    changes.to_update.insert(entry.id);
                },
                Some(true) => {},
            }
        }

        if page >= resp.total_pages {
            break;
        }
        page += 1;
    }

    Ok(changes)
}
