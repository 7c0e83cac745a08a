//! Identifier to table/column name conversion

/// Convert a mixed-case identifier into its snake_case table or column name
///
/// The identifier is split before every ASCII uppercase letter, every segment
/// is lowercased and the segments are joined with `_`. Leading underscores
/// are stripped, so a leading capital never produces an empty first segment.
///
/// Already converted names pass through unchanged, which makes the
/// conversion idempotent.
///
/// ```
/// assert_eq!(rowmap::naming::to_snake_case("EmployeeList"), "employee_list");
/// assert_eq!(rowmap::naming::to_snake_case("postalCode"), "postal_code");
/// assert_eq!(rowmap::naming::to_snake_case("postal_code"), "postal_code");
/// ```
pub fn to_snake_case(identifier: &str) -> String {
    let mut name = String::with_capacity(identifier.len() + 4);

    for c in identifier.chars() {
        if c.is_ascii_uppercase() {
            name.push('_');
        }
        name.push(c.to_ascii_lowercase());
    }

    match name.find(|c: char| c != '_') {
        Some(start) => name.split_off(start),
        None => String::new(),
    }
}
