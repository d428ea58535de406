use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identifies one chat session. On Telegram this is the chat id, which for a
/// private conversation with the bot equals the user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Sequence id assigned to a post by the source platform, unique within a chat.
pub type MessageId = i32;

/// What kind of attachment a post carries. Only used to name files that
/// arrive without a name (photos, voice notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    #[default]
    Document,
    Photo,
    Video,
    Audio,
    Voice,
    Animation,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Document => "document",
            AttachmentKind::Photo => "photo",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Voice => "voice",
            AttachmentKind::Animation => "animation",
        }
    }
}

/// Descriptor of the binary payload attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Platform handle used to download the payload.
    pub file_id: String,
    pub name: Option<String>,
    pub size: u64,
    pub content_type: Option<String>,
    #[serde(default)]
    pub kind: AttachmentKind,
}

/// One remote post. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub session: SessionId,
    pub id: MessageId,
    /// Shared by every post of one multi-attachment upload (an album).
    pub group_id: Option<String>,
    pub attachment: Option<Attachment>,
}

impl RemoteRef {
    pub fn new(session: SessionId, id: MessageId) -> Self {
        Self {
            session,
            id,
            group_id: None,
            attachment: None,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Posts without a payload cannot be fetched and are filtered out everywhere.
    pub fn is_fetchable(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id.is_some()
    }

    /// Payload size in bytes, zero when there is no payload.
    pub fn payload_size(&self) -> u64 {
        self.attachment.as_ref().map(|a| a.size).unwrap_or(0)
    }

    /// Name shown to the user in listings.
    pub fn display_name(&self) -> String {
        match &self.attachment {
            Some(Attachment { name: Some(name), .. }) if !name.trim().is_empty() => name.clone(),
            Some(a) => format!("{}_{}", a.kind.as_str(), self.id),
            None => format!("message_{}", self.id),
        }
    }

    /// Name used for the local copy: a single sanitised path component.
    /// Unnamed payloads get `<kind>_<id>` plus an extension guessed from the
    /// content type so archive entries stay distinct.
    pub fn local_file_name(&self) -> String {
        let base = match &self.attachment {
            Some(Attachment { name: Some(name), .. }) if !name.trim().is_empty() => {
                sanitize_file_name(name)
            }
            Some(a) => {
                let ext = a
                    .content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .or(match a.kind {
                        AttachmentKind::Photo => Some("jpg"),
                        _ => None,
                    });
                match ext {
                    Some(ext) => format!("{}_{}.{}", a.kind.as_str(), self.id, ext),
                    None => format!("{}_{}", a.kind.as_str(), self.id),
                }
            }
            None => format!("message_{}", self.id),
        };
        if base.is_empty() {
            "no_name".to_string()
        } else {
            base
        }
    }
}

/// Strip directory components and characters that are unsafe in file names.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(name)
        .trim();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => String::new(),
        _ => cleaned,
    }
}

/// `name` itself when it is still free, otherwise `stem (n).ext` with the
/// first free `n`. The chosen name is recorded in `taken`.
pub fn unique_file_name(name: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 1;
    while taken.contains(&candidate) {
        let path = Path::new(name);
        candidate = match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => {
                format!("{} ({n}).{}", stem.to_string_lossy(), ext.to_string_lossy())
            }
            _ => format!("{name} ({n})"),
        };
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let ext = match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}
