//! Regiment name standardization
//!
//! The roll spells the county regiments many ways ("N. Staffs",
//! "1st/5th Bn. North Staffordshire Regt."). The surname/regiment pivot
//! groups on the name, so variants are folded onto one canonical form.

/// Written when a row has no regiment text at all
pub const OTHER: &str = "Other";

/// Canonical name for a known regiment, `None` when no rule matches.
pub fn canonical(raw: &str) -> Option<&'static str> {
    let lower = raw.to_lowercase();
    if lower.contains("north") && lower.contains("staff") {
        Some("North Staffordshire Regiment")
    } else if lower.contains("south") && lower.contains("staff") {
        Some("South Staffordshire Regiment")
    } else if lower.contains("artillery") {
        Some("Royal Artillery")
    } else {
        None
    }
}

/// Standardize a regiment cell. Unmatched names pass through unchanged.
pub fn normalize(raw: Option<&str>) -> String {
    match raw {
        Some(name) => canonical(name).map_or_else(|| name.to_string(), str::to_string),
        None => OTHER.to_string(),
    }
}
