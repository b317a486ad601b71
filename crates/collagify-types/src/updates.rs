use serde::{Deserialize, Serialize};

/// Incoming update from `getUpdates`. Only the kinds the bot subscribes to
/// are modelled; everything else deserializes with both fields empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,

    /// A new post in a channel the bot is a member of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,

    /// The bot's own membership changed (added to / removed from a chat)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i64,
    pub chat: Chat,
    /// Unix seconds, UTC.
    pub date: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photo: Vec<PhotoSize>,
}

impl Message {
    /// The largest available rendition of the attached photo, by file size.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.iter().max_by_key(|p| p.file_size.unwrap_or(0))
    }
}

/// One size variant of a posted photo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    /// Unix seconds, UTC.
    pub date: i64,
}
