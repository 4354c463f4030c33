//! Layout document normalization
//!
//! The layout file is an external boundary: it can be hand-edited, written by
//! an older version, or stale relative to the current channel universe, and
//! client-submitted documents are no more trustworthy. Nothing is adopted
//! verbatim; every read and every write goes through these functions, which
//! coerce malformed values to safe defaults instead of rejecting them.

use super::types::{
    GlobalGroup, GlobalSettings, GroupSettings, GroupType, LayoutDocument, LayoutSection, MixRef,
    SumMode, ViewSettings, ViewSettingsMap, FAVORITES_ID, FAVORITES_NAME, LAYOUT_VERSION,
    OTHERS_ID, OTHERS_NAME, SECTION_ENABLED_DEFAULT, SETTINGS_ENABLED_DEFAULT,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Finite number or 0
fn coerce_offset_db(v: Option<&Value>) -> f64 {
    v.and_then(Value::as_f64).filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn coerce_bool(v: Option<&Value>, default: bool) -> bool {
    v.and_then(Value::as_bool).unwrap_or(default)
}

fn coerce_mode(v: Option<&Value>) -> SumMode {
    v.and_then(Value::as_str)
        .and_then(SumMode::parse)
        .unwrap_or(SumMode::FALLBACK)
}

/// Non-empty string `id` field
fn entry_id(v: &Value) -> Option<String> {
    v.get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Filter a raw channel list to the universe, dropping duplicates but
/// preserving the original order
fn coerce_channel_ids(v: Option<&Value>, universe: &BTreeSet<u16>) -> Vec<u16> {
    let Some(arr) = v.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    arr.iter()
        .filter_map(Value::as_u64)
        .filter_map(|n| u16::try_from(n).ok())
        .filter(|id| universe.contains(id) && seen.insert(*id))
        .collect()
}

/// Normalize an aux bus's section list.
///
/// Guarantees exactly one "favorites" section (first) and exactly one
/// "others" section (last). "others" is recomputed to hold every channel of
/// the universe not claimed by "favorites", keeping its pre-existing valid
/// ordering and appending newly unclaimed channels at the end. Idempotent.
pub fn normalize_sections(raw: &[Value], universe: &BTreeSet<u16>) -> Vec<LayoutSection> {
    let mut seen = HashSet::new();
    let mut sections: Vec<LayoutSection> = Vec::new();

    for v in raw {
        let Some(id) = entry_id(v) else { continue };
        if !seen.insert(id.clone()) {
            continue;
        }
        let name = if id == FAVORITES_ID {
            FAVORITES_NAME.to_string()
        } else {
            v.get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(&id)
                .to_string()
        };
        sections.push(LayoutSection {
            name,
            channel_ids: coerce_channel_ids(v.get("channelIds"), universe),
            offset_db: coerce_offset_db(v.get("offsetDb")),
            mode: coerce_mode(v.get("mode")),
            enabled: coerce_bool(v.get("enabled"), SECTION_ENABLED_DEFAULT),
            id,
        });
    }

    let favorites = match sections.iter().position(|s| s.id == FAVORITES_ID) {
        Some(i) => sections.remove(i),
        None => LayoutSection {
            id: FAVORITES_ID.to_string(),
            name: FAVORITES_NAME.to_string(),
            channel_ids: Vec::new(),
            offset_db: 0.0,
            mode: SumMode::FALLBACK,
            enabled: SECTION_ENABLED_DEFAULT,
        },
    };
    let mut others = match sections.iter().position(|s| s.id == OTHERS_ID) {
        Some(i) => sections.remove(i),
        None => LayoutSection {
            id: OTHERS_ID.to_string(),
            name: OTHERS_NAME.to_string(),
            channel_ids: Vec::new(),
            offset_db: 0.0,
            mode: SumMode::FALLBACK,
            enabled: SECTION_ENABLED_DEFAULT,
        },
    };

    // Recompute "others": everything not claimed by favorites, existing order first
    let claimed: HashSet<u16> = favorites.channel_ids.iter().copied().collect();
    let mut other_ids: Vec<u16> = others
        .channel_ids
        .iter()
        .filter(|id| !claimed.contains(id))
        .copied()
        .collect();
    for id in universe {
        if !claimed.contains(id) && !other_ids.contains(id) {
            other_ids.push(*id);
        }
    }
    others.channel_ids = other_ids;

    let mut out = Vec::with_capacity(sections.len() + 2);
    out.push(favorites);
    out.append(&mut sections);
    out.push(others);
    out
}

/// Normalize the global group list: drop id-less or duplicate-id groups,
/// filter and deduplicate each channel list against the universe
pub fn normalize_global_groups(raw: &[Value], universe: &BTreeSet<u16>) -> Vec<GlobalGroup> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|v| {
            let id = entry_id(v)?;
            if !seen.insert(id.clone()) {
                return None;
            }
            let name = v
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(&id)
                .to_string();
            Some(GlobalGroup {
                name,
                channel_ids: coerce_channel_ids(v.get("channelIds"), universe),
                id,
            })
        })
        .collect()
}

/// Normalize one settings entry. Settings default to disabled, unlike sections.
pub fn normalize_settings(raw: Option<&Value>) -> GroupSettings {
    GroupSettings {
        offset_db: coerce_offset_db(raw.and_then(|v| v.get("offsetDb"))),
        mode: coerce_mode(raw.and_then(|v| v.get("mode"))),
        enabled: coerce_bool(raw.and_then(|v| v.get("enabled")), SETTINGS_ENABLED_DEFAULT),
    }
}

/// Normalize a mix-order list: keep well-formed group/channel references,
/// deduplicated by composite key, first-seen order preserved
pub fn normalize_mix_order(raw: Option<&Value>) -> Vec<MixRef> {
    let Some(arr) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for v in arr {
        let entry = match v.get("kind").and_then(Value::as_str) {
            Some("group") => {
                let Some(group_type) =
                    v.get("groupType").and_then(Value::as_str).and_then(GroupType::parse)
                else {
                    continue;
                };
                let Some(id) = entry_id(v) else { continue };
                MixRef::Group { group_type, id }
            }
            Some("channel") => {
                let Some(id) = v
                    .get("id")
                    .and_then(Value::as_u64)
                    .and_then(|n| u16::try_from(n).ok())
                else {
                    continue;
                };
                MixRef::Channel { id }
            }
            _ => continue,
        };
        if seen.insert(entry.dedup_key()) {
            out.push(entry);
        }
    }
    out
}

/// Normalize one view-settings entry
pub fn normalize_view_settings(raw: Option<&Value>) -> ViewSettings {
    ViewSettings {
        offset_db: coerce_offset_db(raw.and_then(|v| v.get("offsetDb"))),
        simple_controls: coerce_bool(raw.and_then(|v| v.get("simpleControls")), false),
        mix_order: normalize_mix_order(raw.and_then(|v| v.get("mixOrder"))),
    }
}

/// Aux-keyed object filtered to the configured aux universe
fn aux_entries<'a>(
    raw: Option<&'a Value>,
    aux_ids: &BTreeSet<u16>,
) -> Vec<(u16, &'a Value)> {
    let Some(obj) = raw.and_then(Value::as_object) else {
        return Vec::new();
    };
    obj.iter()
        .filter_map(|(k, v)| {
            let id: u16 = k.parse().ok()?;
            aux_ids.contains(&id).then_some((id, v))
        })
        .collect()
}

/// Normalize a whole raw document into a typed [`LayoutDocument`]
pub fn normalize_document(
    raw: &Value,
    channels: &BTreeSet<u16>,
    aux_ids: &BTreeSet<u16>,
) -> LayoutDocument {
    let aux: BTreeMap<u16, Vec<LayoutSection>> = aux_entries(raw.get("aux"), aux_ids)
        .into_iter()
        .map(|(id, v)| {
            let sections = v.as_array().map(Vec::as_slice).unwrap_or(&[]);
            (id, normalize_sections(sections, channels))
        })
        .collect();

    let global_groups = raw
        .get("globalGroups")
        .and_then(Value::as_array)
        .map(|arr| normalize_global_groups(arr, channels))
        .unwrap_or_default();

    let gs = raw.get("globalSettings");
    let global_settings = GlobalSettings {
        master: normalize_settings(gs.and_then(|v| v.get("master"))),
        gain: normalize_settings(gs.and_then(|v| v.get("gain"))),
        aux: aux_entries(gs.and_then(|v| v.get("aux")), aux_ids)
            .into_iter()
            .map(|(id, v)| (id, normalize_settings(Some(v))))
            .collect(),
    };

    let vs = raw.get("viewSettings");
    let view_settings = ViewSettingsMap {
        master: normalize_view_settings(vs.and_then(|v| v.get("master"))),
        gain: normalize_view_settings(vs.and_then(|v| v.get("gain"))),
        aux: aux_entries(vs.and_then(|v| v.get("aux")), aux_ids)
            .into_iter()
            .map(|(id, v)| (id, normalize_view_settings(Some(v))))
            .collect(),
    };

    LayoutDocument {
        version: LAYOUT_VERSION,
        aux,
        global_groups,
        global_settings,
        view_settings,
    }
}
