//! `palace-types` – the memory palace data model.
//!
//! A [`MemoryPalace`] owns one or more [`Room`]s, each room owns the
//! [`MemoryObject`]s placed in it, and a [`QuizSession`] is an ephemeral
//! shuffled traversal of one room's objects.  The JSON shape produced by the
//! serde derives is the palace export/import format, so field names follow
//! the browser-era camelCase layout.
//!
//! Read-only reference data (object types and room templates) lives in
//! [`catalog`].

pub mod catalog;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::RoomTemplate;

/// A position, Euler rotation or scale in scene space.
pub type Vec3 = [f64; 3];

/// Colour given to freshly placed objects.
pub const DEFAULT_OBJECT_COLOR: &str = "#FFFFFF";

/// Generate a fresh identity of the form `<prefix>-<uuid v4>`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

// ─────────────────────────────────────────────────────────────────────────────
// Mode
// ─────────────────────────────────────────────────────────────────────────────

/// The interaction mode of the application.  Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Walk around the palace.
    #[default]
    Explore,
    /// Place and annotate objects.
    Edit,
    /// Locate objects from their titles.
    Quiz,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Explore => "explore",
            Mode::Edit => "edit",
            Mode::Quiz => "quiz",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explore" => Ok(Mode::Explore),
            "edit" => Ok(Mode::Edit),
            "quiz" => Ok(Mode::Quiz),
            other => Err(ModelError::UnknownMode(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RoomTemplateId
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of room themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomTemplateId {
    AncientLibrary,
    MedievalCastle,
    ModernOffice,
    ZenGarden,
}

impl RoomTemplateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomTemplateId::AncientLibrary => "ancient-library",
            RoomTemplateId::MedievalCastle => "medieval-castle",
            RoomTemplateId::ModernOffice => "modern-office",
            RoomTemplateId::ZenGarden => "zen-garden",
        }
    }

    /// Parse a kebab-case template id.  Returns `None` for unknown ids.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ancient-library" => Some(RoomTemplateId::AncientLibrary),
            "medieval-castle" => Some(RoomTemplateId::MedievalCastle),
            "modern-office" => Some(RoomTemplateId::ModernOffice),
            "zen-garden" => Some(RoomTemplateId::ZenGarden),
            _ => None,
        }
    }
}

impl fmt::Display for RoomTemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lighting
// ─────────────────────────────────────────────────────────────────────────────

/// The single directional light of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: String,
    pub position: Vec3,
    pub intensity: f64,
}

/// Room lighting: an ambient colour plus one directional light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub ambient: String,
    pub directional: DirectionalLight,
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryObject
// ─────────────────────────────────────────────────────────────────────────────

/// A placed, annotated item inside a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryObject {
    /// Unique within the owning room.
    pub id: String,
    /// Object-type catalog id (open set, e.g. `"sword"`).
    #[serde(rename = "type")]
    pub object_type: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    /// CSS-style hex colour.
    pub color: String,
    /// Free-text mnemonic note.
    #[serde(rename = "text")]
    pub note: String,
    /// Display title; the quiz asks the user to find objects by this.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// User-facing recall confidence rating.
    pub memory_strength: i32,
}

impl MemoryObject {
    /// A freshly placed object of `object_type` at `position`, with zero
    /// rotation, unit scale, white colour, an empty note and the title
    /// `"New <type>"`.
    pub fn new(object_type: &str, position: Vec3) -> Self {
        Self {
            id: new_id("obj"),
            object_type: object_type.to_string(),
            position,
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
            color: DEFAULT_OBJECT_COLOR.to_string(),
            note: String::new(),
            title: format!("New {object_type}"),
            last_reviewed: None,
            memory_strength: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ObjectPatch
// ─────────────────────────────────────────────────────────────────────────────

/// A partial update for a [`MemoryObject`].
///
/// Every field left as `None` is kept; every `Some` overwrites the matching
/// attribute.  The identity is never patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, rename = "text", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_strength: Option<i32>,
}

impl ObjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn last_reviewed(mut self, at: DateTime<Utc>) -> Self {
        self.last_reviewed = Some(at);
        self
    }

    pub fn memory_strength(mut self, strength: i32) -> Self {
        self.memory_strength = Some(strength);
        self
    }

    /// `true` when the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite every attribute of `object` that this patch carries.
    pub fn apply_to(&self, object: &mut MemoryObject) {
        if let Some(v) = &self.object_type {
            object.object_type = v.clone();
        }
        if let Some(v) = self.position {
            object.position = v;
        }
        if let Some(v) = self.rotation {
            object.rotation = v;
        }
        if let Some(v) = self.scale {
            object.scale = v;
        }
        if let Some(v) = &self.color {
            object.color = v.clone();
        }
        if let Some(v) = &self.note {
            object.note = v.clone();
        }
        if let Some(v) = &self.title {
            object.title = v.clone();
        }
        if let Some(v) = self.last_reviewed {
            object.last_reviewed = Some(v);
        }
        if let Some(v) = self.memory_strength {
            object.memory_strength = v;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Room
// ─────────────────────────────────────────────────────────────────────────────

/// A themed space holding placed objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub template: RoomTemplateId,
    pub objects: Vec<MemoryObject>,
    pub lighting: Lighting,
}

impl Room {
    /// Build an empty room named and lit after `template`.
    pub fn from_template(template: &RoomTemplate) -> Self {
        Self {
            id: new_id("room"),
            name: template.name.to_string(),
            template: template.id,
            objects: Vec::new(),
            lighting: template.environment.lighting.to_lighting(),
        }
    }

    pub fn object(&self, id: &str) -> Option<&MemoryObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: &str) -> Option<&mut MemoryObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryPalace
// ─────────────────────────────────────────────────────────────────────────────

/// A saved project: one or more rooms plus the id of the active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPalace {
    pub id: String,
    pub name: String,
    pub rooms: Vec<Room>,
    /// Identity of the active room.
    pub current_room: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl MemoryPalace {
    /// A new palace containing exactly `room`, which becomes current.
    pub fn new(name: &str, room: Room) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("palace"),
            name: name.to_string(),
            current_room: room.id.clone(),
            rooms: vec![room],
            created: now,
            last_modified: now,
        }
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn room_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == id)
    }

    /// The declared current room if it exists, otherwise the first room.
    pub fn resolve_current_room(&self) -> Option<&Room> {
        self.room(&self.current_room).or_else(|| self.rooms.first())
    }

    /// Check the structural invariants: at least one room, unique room ids,
    /// and unique object ids within each room.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.rooms.is_empty() {
            return Err(ModelError::NoRooms);
        }
        let mut room_ids = HashSet::new();
        for room in &self.rooms {
            if !room_ids.insert(room.id.as_str()) {
                return Err(ModelError::DuplicateRoom(room.id.clone()));
            }
            let mut object_ids = HashSet::new();
            for object in &room.objects {
                if !object_ids.insert(object.id.as_str()) {
                    return Err(ModelError::DuplicateObject {
                        room: room.id.clone(),
                        object: object.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// QuizSession
// ─────────────────────────────────────────────────────────────────────────────

/// A scored traversal of a room's objects in a fixed shuffled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: String,
    pub palace_id: String,
    /// Object identities in question order, fixed at creation.
    pub objects: Vec<String>,
    /// Always within `[0, objects.len())`.
    pub current_index: usize,
    pub score: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub mistakes: u32,
}

impl QuizSession {
    /// Start a session over `objects` (already in question order).
    pub fn new(palace_id: &str, objects: Vec<String>) -> Self {
        Self {
            id: new_id("quiz"),
            palace_id: palace_id.to_string(),
            objects,
            current_index: 0,
            score: 0,
            start_time: Utc::now(),
            end_time: None,
            mistakes: 0,
        }
    }

    /// Identity of the object the current question asks for.
    pub fn current_object_id(&self) -> Option<&str> {
        self.objects.get(self.current_index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// `true` when the current question is the final one.
    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.objects.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Violations of the palace model's structural invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Palace has no rooms")]
    NoRooms,
    #[error("Duplicate room id: {0}")]
    DuplicateRoom(String),
    #[error("Duplicate object id {object} in room {room}")]
    DuplicateObject { room: String, object: String },
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}
