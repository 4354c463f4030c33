//! Layout document type definitions
//!
//! The persisted, user-editable configuration: per-aux channel sections,
//! global groups, per-bus group settings, and per-bus view settings. The
//! document lives as a single JSON file and is normalized on every read and
//! write (see [`super::normalize`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted document format version
pub const LAYOUT_VERSION: u32 = 2;

/// Reserved section pinned first in every aux layout
pub const FAVORITES_ID: &str = "favorites";
/// Fixed display name for the favorites section
pub const FAVORITES_NAME: &str = "Favorites";
/// Reserved catch-all section pinned last in every aux layout
pub const OTHERS_ID: &str = "others";
/// Display name given to the others section when it has to be inserted
pub const OTHERS_NAME: &str = "Others";

/// Sections default to enabled; settings maps default to disabled.
/// The asymmetry is intentional, keep these two constants distinct.
pub const SECTION_ENABLED_DEFAULT: bool = true;
pub const SETTINGS_ENABLED_DEFAULT: bool = false;

/// How channel levels are summed for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SumMode {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "ignore-inf")]
    IgnoreInf,
    #[serde(rename = "ignore-inf-sends")]
    IgnoreInfSends,
}

impl SumMode {
    /// The mode malformed or missing values coerce to
    pub const FALLBACK: SumMode = SumMode::IgnoreInf;

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(SumMode::Default),
            "ignore-inf" => Some(SumMode::IgnoreInf),
            "ignore-inf-sends" => Some(SumMode::IgnoreInfSends),
            _ => None,
        }
    }
}

/// A named, ordered subset of channels for one aux bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSection {
    pub id: String,
    pub name: String,
    pub channel_ids: Vec<u16>,
    pub offset_db: f64,
    pub mode: SumMode,
    pub enabled: bool,
}

/// A named channel grouping independent of any single bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalGroup {
    pub id: String,
    pub name: String,
    pub channel_ids: Vec<u16>,
}

/// Offset/mode/enabled triple attached to a bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    pub offset_db: f64,
    pub mode: SumMode,
    pub enabled: bool,
}

impl GroupSettings {
    /// Settings default to disabled, unlike sections
    pub fn disabled() -> Self {
        Self {
            offset_db: 0.0,
            mode: SumMode::FALLBACK,
            enabled: SETTINGS_ENABLED_DEFAULT,
        }
    }
}

/// Kind of group a mix-order entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    /// An aux-scoped section
    Section,
    /// A global group
    Global,
}

impl GroupType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "section" => Some(GroupType::Section),
            "global" => Some(GroupType::Global),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Section => "section",
            GroupType::Global => "global",
        }
    }
}

/// One entry in the user-chosen display ordering of a bus view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MixRef {
    #[serde(rename_all = "camelCase")]
    Group { group_type: GroupType, id: String },
    Channel { id: u16 },
}

impl MixRef {
    /// Composite key used to deduplicate mix-order entries
    pub fn dedup_key(&self) -> String {
        match self {
            MixRef::Group { group_type, id } => format!("group|{}|{}", group_type.as_str(), id),
            MixRef::Channel { id } => format!("channel||{id}"),
        }
    }
}

/// Per-bus display preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    pub offset_db: f64,
    pub simple_controls: bool,
    pub mix_order: Vec<MixRef>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            offset_db: 0.0,
            simple_controls: false,
            mix_order: Vec::new(),
        }
    }
}

/// Group settings per bus: one slot each for master and gain, one per aux bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub master: GroupSettings,
    pub gain: GroupSettings,
    pub aux: BTreeMap<u16, GroupSettings>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            master: GroupSettings::disabled(),
            gain: GroupSettings::disabled(),
            aux: BTreeMap::new(),
        }
    }
}

/// View settings per bus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettingsMap {
    pub master: ViewSettings,
    pub gain: ViewSettings,
    pub aux: BTreeMap<u16, ViewSettings>,
}

/// The whole persisted configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    pub version: u32,
    /// Sections per aux bus id
    pub aux: BTreeMap<u16, Vec<LayoutSection>>,
    pub global_groups: Vec<GlobalGroup>,
    pub global_settings: GlobalSettings,
    pub view_settings: ViewSettingsMap,
}

impl Default for LayoutDocument {
    fn default() -> Self {
        Self {
            version: LAYOUT_VERSION,
            aux: BTreeMap::new(),
            global_groups: Vec::new(),
            global_settings: GlobalSettings::default(),
            view_settings: ViewSettingsMap::default(),
        }
    }
}

/// A settings/view target: a bus, or one aux bus by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTarget {
    Master,
    Gain,
    Aux(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_mode_parse_matches_serde() {
        for mode in [SumMode::Default, SumMode::IgnoreInf, SumMode::IgnoreInfSends] {
            let s = serde_json::to_value(mode).unwrap();
            assert_eq!(SumMode::parse(s.as_str().unwrap()), Some(mode));
        }
        assert_eq!(SumMode::parse("loud"), None);
    }

    #[test]
    fn test_mix_ref_wire_shape() {
        let g = MixRef::Group { group_type: GroupType::Global, id: "band".into() };
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(v["kind"], "group");
        assert_eq!(v["groupType"], "global");
        assert_eq!(v["id"], "band");

        let c = MixRef::Channel { id: 7 };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["kind"], "channel");
        assert_eq!(v["id"], 7);
    }

    #[test]
    fn test_dedup_key_distinguishes_kinds() {
        let a = MixRef::Group { group_type: GroupType::Global, id: "7".into() };
        let b = MixRef::Channel { id: 7 };
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
