// Shared domain types for the newsdesk engine

use serde::{Deserialize, Serialize};

/// Article publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsStatus {
    Draft,
    Published,
    Archived,
}

impl NewsStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Create from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for NewsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comment moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
    Spam,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Spam => "spam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "spam" => Some(Self::Spam),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reaction type for like/dislike toggling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RSS feed lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Active,
    Inactive,
    Error,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived reliability label for an RSS feed (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedHealth {
    Inactive,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl FeedHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl std::fmt::Display for FeedHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advertisement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    Active,
    Inactive,
    Expired,
}

impl AdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for AdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed advertisement display slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPosition {
    Header,
    Sidebar,
    Footer,
    ContentTop,
    ContentMiddle,
    ContentBottom,
    Popup,
    Banner,
}

impl AdPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Sidebar => "sidebar",
            Self::Footer => "footer",
            Self::ContentTop => "content_top",
            Self::ContentMiddle => "content_middle",
            Self::ContentBottom => "content_bottom",
            Self::Popup => "popup",
            Self::Banner => "banner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "header" => Some(Self::Header),
            "sidebar" => Some(Self::Sidebar),
            "footer" => Some(Self::Footer),
            "content_top" => Some(Self::ContentTop),
            "content_middle" => Some(Self::ContentMiddle),
            "content_bottom" => Some(Self::ContentBottom),
            "popup" => Some(Self::Popup),
            "banner" => Some(Self::Banner),
            _ => None,
        }
    }

    /// Get all positions
    pub fn all() -> Vec<Self> {
        vec![
            Self::Header,
            Self::Sidebar,
            Self::Footer,
            Self::ContentTop,
            Self::ContentMiddle,
            Self::ContentBottom,
            Self::Popup,
            Self::Banner,
        ]
    }
}

impl std::fmt::Display for AdPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advertisement pricing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Cost per thousand impressions
    Cpm,
    /// Cost per click
    Cpc,
    /// Flat rate
    Fixed,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpm => "cpm",
            Self::Cpc => "cpc",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cpm" => Some(Self::Cpm),
            "cpc" => Some(Self::Cpc),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Media classification, derived from the file extension at upload time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    /// Classify from a file name's extension
    pub fn from_extension(file_name: &str) -> Self {
        let ext = file_name
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" => Self::Image,
            "mp4" | "mov" | "avi" | "webm" | "mkv" => Self::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "flac" => Self::Audio,
            _ => Self::Document,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User role, supplied by the external auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    Author,
    Subscriber,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Author => "author",
            Self::Subscriber => "subscriber",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "author" => Some(Self::Author),
            "subscriber" => Some(Self::Subscriber),
            _ => None,
        }
    }

    /// Admins and editors bypass moderation and ownership checks
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated caller: id plus role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}

/// Attribution key for reactions and view events
///
/// Exactly one of the two forms is recorded per row; consumers must handle
/// both cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// A registered user, keyed by user id
    Registered { user_id: i64 },
    /// An anonymous visitor, keyed by IP address
    Anonymous { ip: String },
}

impl Identity {
    pub fn registered(user_id: i64) -> Self {
        Self::Registered { user_id }
    }

    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self::Anonymous { ip: ip.into() }
    }

    /// The (user_id, visitor_ip) column pair this identity persists as
    pub fn columns(&self) -> (Option<i64>, Option<&str>) {
        match self {
            Self::Registered { user_id } => (Some(*user_id), None),
            Self::Anonymous { ip } => (None, Some(ip.as_str())),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered { user_id } => write!(f, "user:{user_id}"),
            Self::Anonymous { ip } => write!(f, "ip:{ip}"),
        }
    }
}

/// Comment authorship: a registered user or a named guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommentAuthor {
    Registered { user_id: i64 },
    Guest { name: String, email: String },
}

impl CommentAuthor {
    /// Registered author's user id, if any
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Registered { user_id } => Some(*user_id),
            Self::Guest { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [NewsStatus::Draft, NewsStatus::Published, NewsStatus::Archived] {
            assert_eq!(NewsStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NewsStatus::parse("unknown"), None);
    }

    #[test]
    fn test_comment_status_round_trip() {
        for status in [
            CommentStatus::Pending,
            CommentStatus::Approved,
            CommentStatus::Rejected,
            CommentStatus::Spam,
        ] {
            assert_eq!(CommentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_ad_position_round_trip() {
        for position in AdPosition::all() {
            assert_eq!(AdPosition::parse(position.as_str()), Some(position));
        }
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(MediaType::from_extension("photo.JPG"), MediaType::Image);
        assert_eq!(MediaType::from_extension("clip.webm"), MediaType::Video);
        assert_eq!(MediaType::from_extension("episode.mp3"), MediaType::Audio);
        assert_eq!(MediaType::from_extension("report.pdf"), MediaType::Document);
        assert_eq!(MediaType::from_extension("no_extension"), MediaType::Document);
    }

    #[test]
    fn test_role_privileges() {
        assert!(Role::Admin.is_privileged());
        assert!(Role::Editor.is_privileged());
        assert!(!Role::Author.is_privileged());
        assert!(!Role::Subscriber.is_privileged());
    }

    #[test]
    fn test_identity_columns() {
        assert_eq!(Identity::registered(7).columns(), (Some(7), None));

        let anon = Identity::anonymous("203.0.113.9");
        assert_eq!(anon.columns(), (None, Some("203.0.113.9")));
        assert_eq!(anon.to_string(), "ip:203.0.113.9");
    }

    #[test]
    fn test_comment_author_user_id() {
        assert_eq!(CommentAuthor::Registered { user_id: 3 }.user_id(), Some(3));
        let guest = CommentAuthor::Guest {
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
        };
        assert_eq!(guest.user_id(), None);
    }
}
