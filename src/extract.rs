use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENTITY_EXTENSION: &str = ".entity";
pub const HSCRIPT_EXTENSION: &str = ".hx";
const UNKNOWN_ANIMATION: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Entity,
    HScript,
    Other,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(ENTITY_EXTENSION) {
            FileKind::Entity
        } else if name.ends_with(HSCRIPT_EXTENSION) {
            FileKind::HScript
        } else {
            FileKind::Other
        }
    }

    pub fn qualifies(self) -> bool {
        !matches!(self, FileKind::Other)
    }
}

/// One unit of script code and the label used when reporting lines from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntityDocument {
    animations: Vec<Animation>,
    layers: Vec<Layer>,
    keyframes: Vec<Keyframe>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Animation {
    name: String,
    layers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Layer {
    #[serde(rename = "$id", alias = "id")]
    id: String,
    keyframes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Keyframe {
    #[serde(rename = "$id", alias = "id")]
    id: String,
    code: Option<String>,
}

/// Splits a file into the script units that should be scanned. Files that are
/// neither entities nor scripts yield nothing.
pub fn extract_locations(name: &str, text: &str) -> Result<Vec<Location>> {
    match FileKind::from_name(name) {
        FileKind::Entity => entity_locations(name, text),
        FileKind::HScript => Ok(vec![Location {
            label: name.to_string(),
            text: text.to_string(),
        }]),
        FileKind::Other => Ok(Vec::new()),
    }
}

fn entity_locations(name: &str, text: &str) -> Result<Vec<Location>> {
    let document: EntityDocument =
        serde_json::from_str(text).with_context(|| format!("parsing entity {name}"))?;
    let keyframe_animations = frame_script_animations(&document);

    let mut locations = Vec::new();
    for keyframe in &document.keyframes {
        let Some(animation) = keyframe_animations.get(keyframe.id.as_str()) else {
            continue;
        };
        let code = unescape_json_once(keyframe.code.as_deref().unwrap_or(""));
        locations.push(Location {
            label: format!("{name} @ {animation}"),
            text: code,
        });
    }
    Ok(locations)
}

/// Maps every keyframe reachable from an animation to that animation's name.
/// When several animations list the same layer, the last one wins.
fn frame_script_animations(document: &EntityDocument) -> HashMap<&str, &str> {
    let mut layer_animation: HashMap<&str, &str> = HashMap::new();
    for animation in &document.animations {
        for layer in &animation.layers {
            layer_animation.insert(layer.as_str(), animation.name.as_str());
        }
    }

    let mut keyframe_layer: HashMap<&str, &str> = HashMap::new();
    for layer in &document.layers {
        if !layer_animation.contains_key(layer.id.as_str()) {
            continue;
        }
        for keyframe in &layer.keyframes {
            keyframe_layer.insert(keyframe.as_str(), layer.id.as_str());
        }
    }

    keyframe_layer
        .into_iter()
        .map(|(keyframe, layer)| {
            let animation = layer_animation
                .get(layer)
                .copied()
                .unwrap_or(UNKNOWN_ANIMATION);
            (keyframe, animation)
        })
        .collect()
}

/// Undoes one level of JSON string escaping, replacing only the first
/// occurrence of each escape kind.
pub fn unescape_json_once(encoded: &str) -> String {
    const ESCAPES: [(&str, &str); 7] = [
        ("\\b", "\u{8}"),
        ("\\f", "\u{c}"),
        ("\\n", "\n"),
        ("\\r", "\r"),
        ("\\t", "\t"),
        ("\\\"", "\""),
        ("\\\\", "\\"),
    ];
    ESCAPES
        .iter()
        .fold(encoded.to_string(), |text, (escaped, raw)| {
            text.replacen(escaped, raw, 1)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTITY: &str = r#"{
        "animations": [
            {"name": "idle", "layers": ["l1"]},
            {"name": "run", "layers": ["l2"]}
        ],
        "layers": [
            {"$id": "l1", "keyframes": ["k1"]},
            {"$id": "l2", "keyframes": ["k2", "k3"]},
            {"$id": "orphan", "keyframes": ["k4"]}
        ],
        "keyframes": [
            {"$id": "k1", "code": "layer: \"front\""},
            {"$id": "k2", "code": "a();\nb();"},
            {"$id": "k3"},
            {"$id": "k4", "code": "layer: \"back\""}
        ]
    }"#;

    #[test]
    fn file_kind_by_extension() {
        assert_eq!(FileKind::from_name("fighter.entity"), FileKind::Entity);
        assert_eq!(FileKind::from_name("Script.hx"), FileKind::HScript);
        assert_eq!(FileKind::from_name("sprite.png"), FileKind::Other);
        assert!(!FileKind::Other.qualifies());
    }

    #[test]
    fn entity_keyframes_are_labelled_by_animation() {
        let locations = extract_locations("fighter.entity", ENTITY).expect("extract");
        assert_eq!(
            locations,
            vec![
                Location {
                    label: "fighter.entity @ idle".into(),
                    text: "layer: \"front\"".into(),
                },
                Location {
                    label: "fighter.entity @ run".into(),
                    text: "a();\nb();".into(),
                },
                Location {
                    label: "fighter.entity @ run".into(),
                    text: String::new(),
                },
            ]
        );
    }

    #[test]
    fn later_animation_claims_shared_layer() {
        let text = r#"{
            "animations": [
                {"name": "first", "layers": ["l1"]},
                {"name": "second", "layers": ["l1"]}
            ],
            "layers": [{"$id": "l1", "keyframes": ["k1"]}],
            "keyframes": [{"$id": "k1", "code": "x"}]
        }"#;
        let locations = extract_locations("a.entity", text).expect("extract");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].label, "a.entity @ second");
    }

    #[test]
    fn plain_id_key_is_accepted() {
        let text = r#"{
            "animations": [{"name": "idle", "layers": ["l1"]}],
            "layers": [{"id": "l1", "keyframes": ["k1"]}],
            "keyframes": [{"id": "k1", "code": "layer: pick()"}]
        }"#;
        let locations = extract_locations("a.entity", text).expect("extract");
        assert_eq!(
            locations,
            vec![Location {
                label: "a.entity @ idle".into(),
                text: "layer: pick()".into(),
            }]
        );
    }

    #[test]
    fn script_file_is_single_location() {
        let locations = extract_locations("Script.hx", "line1\nline2").expect("extract");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].label, "Script.hx");
        assert_eq!(locations[0].text, "line1\nline2");
    }

    #[test]
    fn other_files_yield_nothing() {
        let locations = extract_locations("notes.txt", "layer: x").expect("extract");
        assert!(locations.is_empty());
    }

    #[test]
    fn malformed_entity_is_an_error() {
        let err = extract_locations("broken.entity", "{ not json").unwrap_err();
        assert!(format!("{err:#}").contains("broken.entity"));
    }

    #[test]
    fn unescape_replaces_first_occurrence_only() {
        assert_eq!(unescape_json_once(r"a\nb\nc"), "a\nb\\nc");
        assert_eq!(unescape_json_once(r#"\"x\""#), "\"x\\\"");
        assert_eq!(unescape_json_once(r"\t\\"), "\t\\");
    }
}
