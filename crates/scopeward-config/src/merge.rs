//! Layered configuration merging.

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Whether the dotted `field_path` (e.g. `"logging.level"`) is set in `value`.
#[must_use]
pub fn has_field(value: &toml::Value, field_path: &str) -> bool {
    let mut current = value;
    for segment in field_path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

/// Set a string leaf at the dotted `field_path`, creating tables on the way.
pub fn set_string_field(value: &mut toml::Value, field_path: &str, new_value: &str) {
    let mut current = value;
    let mut segments = field_path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(
                segment.to_owned(),
                toml::Value::String(new_value.to_owned()),
            );
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}
