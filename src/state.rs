//! Replicated records: presence, desk decorations, whiteboard elements.
//!
//! DESIGN
//! ======
//! These are plain data. The only code that mutates them lives in
//! `services::presence` (presence records, desk items) and
//! `services::whiteboard` (elements); everything else reads clones
//! published through the room view.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ids::{DeskItemId, ElementId, PeerId};
use crate::media::MediaStreamHandle;
use crate::peer::LinkState;

// =============================================================================
// PRESENCE RECORD
// =============================================================================

/// Display state of one logical feed: a peer's camera, or the phantom
/// record standing in for a peer's screen share.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRecord {
    pub peer_id: PeerId,
    pub display_name: String,
    pub avatar_ref: String,
    pub muted: bool,
    pub video_off: bool,
    pub speaking: bool,
    pub is_screen_share: bool,
    pub is_local: bool,
    /// Desk decorations, owned by the peer that authored them.
    pub decorations: Vec<DeskItem>,
    /// Bound media stream, if one has arrived.
    pub stream: Option<MediaStreamHandle>,
    /// Media connection state towards this peer. Always `Connected` for local records.
    pub link: LinkState,
    /// Sender timestamp of the newest update merged into this record.
    pub last_update_ts: i64,
}

impl PresenceRecord {
    /// Record for a peer that has been seen but not yet described.
    #[must_use]
    pub fn placeholder(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            display_name: String::new(),
            avatar_ref: String::new(),
            muted: false,
            video_off: false,
            speaking: false,
            is_screen_share: false,
            is_local: false,
            decorations: Vec::new(),
            stream: None,
            link: LinkState::New,
            last_update_ts: 0,
        }
    }

    /// The local participant's record.
    #[must_use]
    pub fn local(peer_id: PeerId, display_name: &str, avatar_ref: &str) -> Self {
        Self {
            display_name: display_name.to_owned(),
            avatar_ref: avatar_ref.to_owned(),
            is_local: true,
            link: LinkState::Connected,
            ..Self::placeholder(peer_id)
        }
    }

    /// Phantom record for `owner`'s screen share. Never marked local, even
    /// when the owner is.
    #[must_use]
    pub fn screen_of(owner: &PresenceRecord) -> Self {
        Self {
            display_name: screen_name(&owner.display_name),
            muted: true,
            is_screen_share: true,
            link: owner.link,
            last_update_ts: owner.last_update_ts,
            ..Self::placeholder(owner.peer_id.screen())
        }
    }

    /// True while the display name is still unknown.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !self.is_local && self.display_name.is_empty()
    }
}

/// Display name of a screen-share phantom.
#[must_use]
pub fn screen_name(owner_name: &str) -> String {
    format!("{owner_name}'s Screen")
}

// =============================================================================
// DESK ITEMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeskItemKind {
    Note,
    Plant,
    Coffee,
    Pet,
}

/// A decoration placed on a participant's desk. Coordinates are
/// room-relative percentages (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskItem {
    pub id: DeskItemId,
    #[serde(rename = "type")]
    pub kind: DeskItemKind,
    pub x: f64,
    pub y: f64,
    /// Free-form: note text, asset variant, pet state.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl DeskItem {
    /// New item at a random centre-ish position (40-60 % on both axes).
    #[must_use]
    pub fn placed(kind: DeskItemKind, payload: serde_json::Value) -> Self {
        let mut rng = rand::rng();
        Self {
            id: DeskItemId::generate(),
            kind,
            x: rng.random_range(40.0..60.0),
            y: rng.random_range(40.0..60.0),
            payload,
        }
    }
}

// =============================================================================
// WHITEBOARD
// =============================================================================

pub const DEFAULT_STROKE: &str = "#1e293b";
pub const DEFAULT_STROKE_WIDTH: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Path,
    Rect,
    Circle,
    Line,
    Arrow,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A shape on the shared board. No owner: any peer may edit any element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    pub stroke: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl WhiteboardElement {
    fn base(kind: ShapeKind, x: f64, y: f64) -> Self {
        Self {
            id: ElementId::generate(),
            kind,
            x,
            y,
            width: None,
            height: None,
            points: Vec::new(),
            stroke: DEFAULT_STROKE.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            fill: None,
            rotation: 0.0,
            text: None,
            font_size: None,
        }
    }

    /// Box-shaped element (rect, circle, line, arrow). Negative extents are
    /// normalized so `(x, y)` is always the top-left corner.
    #[must_use]
    pub fn boxed(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
        let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };
        Self { width: Some(width), height: Some(height), fill: Some("transparent".to_owned()), ..Self::base(kind, x, y) }
    }

    /// Freehand stroke through `points`. Anchored at the first point.
    #[must_use]
    pub fn path(points: Vec<Point>) -> Self {
        let (x, y) = points.first().map_or((0.0, 0.0), |p| (p.x, p.y));
        Self { points, ..Self::base(ShapeKind::Path, x, y) }
    }

    #[must_use]
    pub fn text(x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            stroke_width: 1.0,
            font_size: Some(24.0),
            ..Self::base(ShapeKind::Text, x, y)
        }
    }

    #[must_use]
    pub fn with_stroke(mut self, color: impl Into<String>, width: f64) -> Self {
        self.stroke = color.into();
        self.stroke_width = width;
        self
    }
}

/// One replicated whiteboard operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum WhiteboardAction {
    Add { data: WhiteboardElement },
    /// Full replacement of the element with the same id.
    Update { data: WhiteboardElement },
    Delete {
        #[serde(rename = "elementId")]
        element_id: ElementId,
    },
    /// Entire element list; replaces local state.
    Sync { data: Vec<WhiteboardElement> },
}

impl WhiteboardAction {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "ADD",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
            Self::Sync { .. } => "SYNC",
        }
    }
}
