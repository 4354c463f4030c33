//! Layout configuration module - persisted channel groupings and view settings
//!
//! User-defined aux sections, global groups, and per-bus settings live in a
//! single versioned JSON document. The document is validated against the
//! channel universe and normalized on every read and write; corrupt files
//! recover via a fallback path and finally via in-memory defaults.

mod normalize;
mod store;
mod types;

pub use normalize::{
    normalize_document, normalize_global_groups, normalize_mix_order, normalize_sections,
    normalize_settings, normalize_view_settings,
};
pub use store::LayoutStore;
pub use types::{
    BusTarget, GlobalGroup, GlobalSettings, GroupSettings, GroupType, LayoutDocument,
    LayoutSection, MixRef, SumMode, ViewSettings, ViewSettingsMap, FAVORITES_ID, FAVORITES_NAME,
    LAYOUT_VERSION, OTHERS_ID, OTHERS_NAME, SECTION_ENABLED_DEFAULT, SETTINGS_ENABLED_DEFAULT,
};
