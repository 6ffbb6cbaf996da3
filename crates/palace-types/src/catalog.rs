//! Read-only catalogs: placeable object types and room templates.
//!
//! Nothing here is mutated at runtime.  The store consumes
//! [`room_template`] when building a palace's first room, and the palette
//! lists [`OBJECT_TYPES`] grouped by [`categories`].

use serde::Serialize;

use crate::{DirectionalLight, Lighting, RoomTemplateId, Vec3};

// ─────────────────────────────────────────────────────────────────────────────
// Object types
// ─────────────────────────────────────────────────────────────────────────────

/// Display metadata for a placeable object type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub id: &'static str,
    pub name: &'static str,
    pub model: &'static str,
    pub category: &'static str,
    pub default_color: &'static str,
    pub description: &'static str,
}

const fn object_type(
    id: &'static str,
    name: &'static str,
    model: &'static str,
    category: &'static str,
    default_color: &'static str,
    description: &'static str,
) -> ObjectType {
    ObjectType {
        id,
        name,
        model,
        category,
        default_color,
        description,
    }
}

/// Every placeable object type, in palette order.
pub static OBJECT_TYPES: [ObjectType; 21] = [
    object_type("book", "Book", "book", "knowledge", "#8B4513", "Ancient tome of wisdom"),
    object_type("scroll", "Scroll", "scroll", "knowledge", "#F4E4BC", "Parchment scroll"),
    object_type("journal", "Journal", "journal", "knowledge", "#654321", "Personal diary"),
    object_type("gem", "Gem", "gem", "treasure", "#FF4500", "Precious gemstone"),
    object_type("coin", "Golden Coin", "coin", "treasure", "#FFD700", "Ancient gold coin"),
    object_type("crown", "Crown", "crown", "treasure", "#FFD700", "Royal crown"),
    object_type("chest", "Treasure Chest", "chest", "treasure", "#8B4513", "Ornate treasure chest"),
    object_type("sword", "Sword", "sword", "weapon", "#C0C0C0", "Knight's blade"),
    object_type("shield", "Shield", "shield", "weapon", "#8B4513", "Protective shield"),
    object_type("mask", "Mask", "mask", "artifact", "#DAA520", "Ceremonial mask"),
    object_type("plant", "Plant", "plant", "nature", "#228B22", "Leafy plant"),
    object_type("flower", "Flower", "flower", "nature", "#FF69B4", "Beautiful flower"),
    object_type("crystal", "Crystal", "crystal", "nature", "#9370DB", "Magical crystal"),
    object_type("candle", "Candle", "candle", "tool", "#FFFACD", "Flickering candle"),
    object_type("key", "Key", "key", "tool", "#FFD700", "Ornate key"),
    object_type("hourglass", "Hourglass", "hourglass", "tool", "#D2691E", "Time keeper"),
    object_type("telescope", "Telescope", "telescope", "tool", "#8B4513", "Stargazing instrument"),
    object_type("painting", "Painting", "painting", "art", "#8B4513", "Framed artwork"),
    object_type("statue", "Statue", "statue", "art", "#A9A9A9", "Stone sculpture"),
    object_type("pottery", "Pottery", "pottery", "art", "#CD853F", "Clay vessel"),
    object_type("instrument", "Lute", "lute", "art", "#8B4513", "Musical instrument"),
];

/// Look up an object type by id.
pub fn find_object_type(id: &str) -> Option<&'static ObjectType> {
    OBJECT_TYPES.iter().find(|t| t.id == id)
}

/// Distinct categories in order of first appearance.
pub fn categories() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for t in &OBJECT_TYPES {
        if !out.contains(&t.category) {
            out.push(t.category);
        }
    }
    out
}

/// All object types belonging to `category`.
pub fn object_types_in(category: &str) -> impl Iterator<Item = &'static ObjectType> + '_ {
    OBJECT_TYPES.iter().filter(move |t| t.category == category)
}

// ─────────────────────────────────────────────────────────────────────────────
// Room templates
// ─────────────────────────────────────────────────────────────────────────────

/// Lighting preset carried by a room template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightingPreset {
    pub ambient: &'static str,
    pub directional_color: &'static str,
    pub directional_position: Vec3,
    pub directional_intensity: f64,
}

impl LightingPreset {
    /// An owned [`Lighting`] value for a new room.
    pub fn to_lighting(&self) -> Lighting {
        Lighting {
            ambient: self.ambient.to_string(),
            directional: DirectionalLight {
                color: self.directional_color.to_string(),
                position: self.directional_position,
                intensity: self.directional_intensity,
            },
        }
    }
}

/// Surface colours and lighting of a room theme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    pub walls: &'static str,
    pub floor: &'static str,
    pub ceiling: &'static str,
    pub lighting: LightingPreset,
}

/// A room theme a palace can be created from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoomTemplate {
    pub id: RoomTemplateId,
    pub name: &'static str,
    pub description: &'static str,
    pub environment: Environment,
}

/// Every room template.  The first entry is the fallback for unknown ids.
pub static ROOM_TEMPLATES: [RoomTemplate; 4] = [
    RoomTemplate {
        id: RoomTemplateId::AncientLibrary,
        name: "Ancient Library",
        description: "Stone walls lined with ancient tomes and scrolls",
        environment: Environment {
            walls: "#696969",
            floor: "#F5F5DC",
            ceiling: "#2F4F4F",
            lighting: LightingPreset {
                ambient: "#404040",
                directional_color: "#FFA500",
                directional_position: [5.0, 10.0, 5.0],
                directional_intensity: 0.8,
            },
        },
    },
    RoomTemplate {
        id: RoomTemplateId::MedievalCastle,
        name: "Medieval Castle",
        description: "Grand throne room with stone walls and colorful banners",
        environment: Environment {
            walls: "#696969",
            floor: "#2F4F4F",
            ceiling: "#1C1C1C",
            lighting: LightingPreset {
                ambient: "#2F2F2F",
                directional_color: "#FF4500",
                directional_position: [0.0, 15.0, 0.0],
                directional_intensity: 1.0,
            },
        },
    },
    RoomTemplate {
        id: RoomTemplateId::ModernOffice,
        name: "Modern Office",
        description: "Sleek contemporary workspace with glass and steel",
        environment: Environment {
            walls: "#F8F8FF",
            floor: "#DCDCDC",
            ceiling: "#FFFFFF",
            lighting: LightingPreset {
                ambient: "#F0F0F0",
                directional_color: "#FFFFFF",
                directional_position: [0.0, 10.0, 5.0],
                directional_intensity: 1.2,
            },
        },
    },
    RoomTemplate {
        id: RoomTemplateId::ZenGarden,
        name: "Zen Garden",
        description: "Peaceful Japanese garden with bamboo and flowing water",
        environment: Environment {
            walls: "#DEB887",
            floor: "#F5DEB3",
            ceiling: "#87CEEB",
            lighting: LightingPreset {
                ambient: "#E6E6FA",
                directional_color: "#FFFACD",
                directional_position: [10.0, 15.0, 10.0],
                directional_intensity: 0.9,
            },
        },
    },
];

/// Look up a room template by its kebab-case id, falling back to the first
/// template when the id is unknown.
pub fn room_template(id: &str) -> &'static RoomTemplate {
    ROOM_TEMPLATES
        .iter()
        .find(|t| t.id.as_str() == id)
        .unwrap_or(&ROOM_TEMPLATES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_template_resolves() {
        let t = room_template("medieval-castle");
        assert_eq!(t.id, RoomTemplateId::MedievalCastle);
        assert_eq!(t.environment.lighting.directional_intensity, 1.0);
    }

    #[test]
    fn unknown_template_falls_back_to_first() {
        let t = room_template("space-station");
        assert_eq!(t.id, RoomTemplateId::AncientLibrary);
    }

    #[test]
    fn every_template_id_is_reachable() {
        for t in &ROOM_TEMPLATES {
            assert_eq!(room_template(t.id.as_str()).id, t.id);
        }
    }

    #[test]
    fn preset_converts_to_room_lighting() {
        let lighting = room_template("zen-garden").environment.lighting.to_lighting();
        assert_eq!(lighting.ambient, "#E6E6FA");
        assert_eq!(lighting.directional.color, "#FFFACD");
        assert_eq!(lighting.directional.position, [10.0, 15.0, 10.0]);
    }

    #[test]
    fn categories_keep_palette_order() {
        assert_eq!(
            categories(),
            vec!["knowledge", "treasure", "weapon", "artifact", "nature", "tool", "art"]
        );
    }

    #[test]
    fn object_types_grouped_by_category() {
        let treasure: Vec<_> = object_types_in("treasure").map(|t| t.id).collect();
        assert_eq!(treasure, vec!["gem", "coin", "crown", "chest"]);
        assert_eq!(object_types_in("nothing").count(), 0);
    }

    #[test]
    fn object_type_lookup() {
        assert_eq!(find_object_type("instrument").unwrap().name, "Lute");
        assert!(find_object_type("dragon").is_none());
    }

    #[test]
    fn object_type_ids_are_unique() {
        let mut ids: Vec<_> = OBJECT_TYPES.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), OBJECT_TYPES.len());
    }
}
