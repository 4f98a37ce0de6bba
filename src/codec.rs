//! Flat text form of an equipment mapping, as stored in the `Equipment` column.
//!
//! `"Tripod x2, Light Stand x1"`, or `"-"` for none. Decoding is best-effort:
//! rows written by hand or by older versions are full of stray tokens.

use crate::model::EquipmentMap;

pub const NONE_SENTINEL: &str = "-";
const QTY_MARKER: &str = " x";

pub fn encode(equipment: &EquipmentMap) -> String {
    let tokens: Vec<String> = equipment
        .iter()
        .filter(|(_, qty)| **qty > 0)
        .map(|(name, qty)| format!("{name}{QTY_MARKER}{qty}"))
        .collect();
    if tokens.is_empty() {
        NONE_SENTINEL.to_string()
    } else {
        tokens.join(", ")
    }
}

/// Never fails. Unparseable tokens are dropped, so an empty result means
/// "no equipment", not "error".
pub fn decode(text: &str) -> EquipmentMap {
    let mut out = EquipmentMap::new();
    let text = text.trim();
    if text.is_empty() || text == NONE_SENTINEL {
        return out;
    }
    for token in text.split(',') {
        if let Some((name, qty)) = decode_token(token.trim()) {
            *out.entry(name.to_string()).or_insert(0) += qty;
        }
    }
    out
}

fn decode_token(token: &str) -> Option<(&str, u32)> {
    // Names may contain " x" themselves; only the last marker separates the quantity.
    let (name, qty) = token.rsplit_once(QTY_MARKER)?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let qty: u32 = qty.trim().parse().ok()?;
    (qty > 0).then_some((name, qty))
}
