//! Table-name inflection.
//!
//! Convention-derived column names need the singular form of a table name
//! (`products` -> `product_id`). The rules here cover the plural shapes that
//! occur in table naming; this is not a general English inflector.

/// Words that have no distinct singular form.
const UNCOUNTABLE: &[&str] = &["equipment", "information", "media", "news", "series", "species"];

/// Irregular plural -> singular pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("houses", "house"),
    ("men", "man"),
    ("mice", "mouse"),
    ("people", "person"),
    ("teeth", "tooth"),
    ("women", "woman"),
];

/// Singularize the last word of a (possibly compound, snake_case) table name.
///
/// `products` -> `product`, `categories` -> `category`,
/// `product_attributes` -> `product_attribute`.
pub fn singularize(table: &str) -> String {
    match table.rfind('_') {
        Some(pos) => {
            let (prefix, word) = table.split_at(pos + 1);
            format!("{}{}", prefix, singularize_word(word))
        }
        None => singularize_word(table),
    }
}

fn singularize_word(word: &str) -> String {
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }

    for (plural, singular) in IRREGULAR {
        if word == *plural {
            return (*singular).to_string();
        }
    }

    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }

    for suffix in ["ches", "shes", "sses", "uses", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }

    if word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}
