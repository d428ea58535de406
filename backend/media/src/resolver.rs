//! Remote Reference Resolver.
//!
//! Group membership is not indexed by the platform, so an album is rebuilt by
//! scanning a fixed window of sequence ids around one of its members.

use std::sync::Arc;

use quickzip_core::{MessageId, MessageSource, QuickZipError, RemoteRef};
use tracing::{debug, warn};

/// Default scan radius on each side of the reference.
pub const DEFAULT_GROUP_RADIUS: i32 = 10;

/// The members of one group, in platform order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub members: Vec<RemoteRef>,
    /// A member sat on the edge of the scanned window, so the album may be
    /// larger than what was found.
    pub possibly_truncated: bool,
}

pub struct GroupResolver {
    source: Arc<dyn MessageSource>,
    radius: i32,
}

impl GroupResolver {
    pub fn new(source: Arc<dyn MessageSource>) -> Self {
        Self::with_radius(source, DEFAULT_GROUP_RADIUS)
    }

    pub fn with_radius(source: Arc<dyn MessageSource>, radius: i32) -> Self {
        Self {
            source,
            radius: radius.max(0),
        }
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Expand `reference` into the ordered set of payload-bearing posts that
    /// share its group. A standalone post resolves to itself, or to nothing if
    /// it has no payload. Lookup errors are returned whole; no partial member
    /// set ever escapes.
    pub async fn expand_group(&self, reference: &RemoteRef) -> Result<ResolvedGroup, QuickZipError> {
        let Some(group_id) = reference.group_id.as_deref() else {
            let members = if reference.is_fetchable() {
                vec![reference.clone()]
            } else {
                Vec::new()
            };
            return Ok(ResolvedGroup {
                members,
                possibly_truncated: false,
            });
        };

        let window = self.window(reference.id);
        let posts = self
            .source
            .get_messages(reference.session, &window)
            .await
            .map_err(|e| QuickZipError::Resolution {
                message_id: reference.id,
                message: e.to_string(),
            })?;

        let mut members = Vec::new();
        let mut possibly_truncated = false;
        let (first, last) = (window.first().copied(), window.last().copied());
        for post in posts.into_iter().flatten() {
            if post.group_id.as_deref() != Some(group_id) || !post.is_fetchable() {
                continue;
            }
            // Lower edge only counts when the window was not clamped at id 1.
            let on_lower_edge = Some(post.id) == first && post.id > 1;
            if on_lower_edge || Some(post.id) == last {
                possibly_truncated = true;
            }
            members.push(post);
        }

        if possibly_truncated {
            warn!(
                message_id = reference.id,
                group = %group_id,
                radius = self.radius,
                found = members.len(),
                "Media group reaches the edge of the scan window; it may be truncated"
            );
        } else {
            debug!(message_id = reference.id, group = %group_id, found = members.len(), "Expanded media group");
        }

        Ok(ResolvedGroup {
            members,
            possibly_truncated,
        })
    }

    /// Sequence ids `id - radius ..= id + radius`, clamped to valid ids.
    fn window(&self, id: MessageId) -> Vec<MessageId> {
        let start = id.saturating_sub(self.radius).max(1);
        let end = id.saturating_add(self.radius);
        (start..=end).collect()
    }
}
