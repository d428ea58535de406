//! Fetch planning: turn a task's accepted references into admission batches.
//!
//! Each batch is one atomic admission unit for the scheduler: a whole media
//! group, or a single standalone post.

use std::collections::HashSet;

use quickzip_core::{admit_within, MessageId, QuickZipError, Rejection, RemoteRef};
use tracing::debug;

use crate::resolver::GroupResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchBatch {
    pub group_id: Option<String>,
    pub members: Vec<RemoteRef>,
}

impl FetchBatch {
    pub fn bytes(&self) -> u64 {
        self.members.iter().map(RemoteRef::payload_size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    pub batches: Vec<FetchBatch>,
    pub total_bytes: u64,
    /// Groups that hit the edge of the resolver's scan window.
    pub truncated_groups: Vec<String>,
}

impl FetchPlan {
    /// Plan over references that are already expanded; each one becomes its
    /// own batch.
    pub fn from_expanded(references: Vec<RemoteRef>) -> Self {
        let batches: Vec<FetchBatch> = references
            .into_iter()
            .filter(RemoteRef::is_fetchable)
            .map(|r| FetchBatch {
                group_id: None,
                members: vec![r],
            })
            .collect();
        let total_bytes = batches.iter().map(FetchBatch::bytes).sum();
        Self {
            batches,
            total_bytes,
            truncated_groups: Vec::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.batches.iter().map(|b| b.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.member_count() == 0
    }

    /// Final gate: the resolved total must itself fit under the ceiling, since
    /// group expansion can add volume the per-message check never saw.
    pub fn check_size(&self, limit: u64) -> Result<(), Rejection> {
        admit_within(0, self.total_bytes, limit).into_result()
    }
}

/// Expand every reference and drop repeats. A group is expanded once even if
/// several of its posts were accepted into the task, and a post already
/// covered by an earlier batch is skipped.
pub async fn plan_fetch(
    resolver: &GroupResolver,
    references: &[RemoteRef],
) -> Result<FetchPlan, QuickZipError> {
    let mut seen_groups: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<MessageId> = HashSet::new();
    let mut plan = FetchPlan::default();

    for reference in references {
        if seen_ids.contains(&reference.id) {
            continue;
        }
        if let Some(group_id) = &reference.group_id {
            if !seen_groups.insert(group_id.clone()) {
                continue;
            }
        }

        let resolved = resolver.expand_group(reference).await?;
        if resolved.possibly_truncated {
            if let Some(group_id) = &reference.group_id {
                plan.truncated_groups.push(group_id.clone());
            }
        }

        let members: Vec<RemoteRef> = resolved
            .members
            .into_iter()
            .filter(|m| seen_ids.insert(m.id))
            .collect();
        if members.is_empty() {
            debug!(message_id = reference.id, "Reference contributes no payloads");
            continue;
        }

        let batch = FetchBatch {
            group_id: reference.group_id.clone(),
            members,
        };
        plan.total_bytes = plan.total_bytes.saturating_add(batch.bytes());
        plan.batches.push(batch);
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, FakeMessageSource};
    use quickzip_core::MAX_TASK_BYTES;
    use std::sync::Arc;

    #[tokio::test]
    async fn album_posts_are_planned_once() {
        let album: Vec<_> = (10..=12).map(|id| post(id, Some("g"), Some(100))).collect();
        let source = FakeMessageSource::with(album.clone());
        let resolver = GroupResolver::new(Arc::new(source));

        // Telegram delivers each album item separately; all three were accepted.
        let mut accepted = album.clone();
        accepted.push(post(30, None, Some(5)));

        let plan = plan_fetch(&resolver, &accepted).await.unwrap();
        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].members.len(), 3);
        assert_eq!(plan.total_bytes, 305);
    }

    #[tokio::test]
    async fn duplicates_and_empty_posts_are_dropped() {
        let resolver = GroupResolver::new(Arc::new(FakeMessageSource::default()));
        let refs = vec![post(1, None, Some(4)), post(1, None, Some(4)), post(2, None, None)];
        let plan = plan_fetch(&resolver, &refs).await.unwrap();
        assert_eq!(plan.member_count(), 1);
    }

    #[tokio::test]
    async fn expansion_can_push_total_over_the_limit() {
        let album: Vec<_> = (1..=3).map(|id| post(id, Some("g"), Some(900_000_000))).collect();
        let resolver = GroupResolver::new(Arc::new(FakeMessageSource::with(album.clone())));
        // Only one album item was seen by the per-message check.
        let plan = plan_fetch(&resolver, &album[..1]).await.unwrap();
        assert_eq!(plan.total_bytes, 2_700_000_000);
        assert!(plan.check_size(MAX_TASK_BYTES).is_err());
    }

    #[tokio::test]
    async fn resolver_failure_aborts_the_plan() {
        let resolver = GroupResolver::new(Arc::new(FakeMessageSource::failing()));
        let refs = vec![post(1, None, Some(1)), post(2, Some("g"), Some(1))];
        assert!(plan_fetch(&resolver, &refs).await.is_err());
    }
}
