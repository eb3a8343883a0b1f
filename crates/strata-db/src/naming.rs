//! Table naming conventions.
//!
//! A model without an explicit table name is stored in the lower-cased,
//! pluralized form of its name (`Category` -> `categories`). Junction tables
//! for many-to-many fields join the lower-cased owner name and the
//! pluralized target name (`Post` + `Tag` -> `post_tags`).

/// Returns the English plural of a lower-case identifier.
///
/// Handles the common suffix rules: consonant + `y` -> `ies`, sibilants
/// (`s`, `x`, `z`, `ch`, `sh`) -> `es`, everything else -> `s`.
///
/// ```
/// use strata_db::naming::pluralize;
///
/// assert_eq!(pluralize("category"), "categories");
/// assert_eq!(pluralize("day"), "days");
/// assert_eq!(pluralize("box"), "boxes");
/// assert_eq!(pluralize("post"), "posts");
/// ```
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// Returns the conventional table name for a model name.
pub fn default_table_name(model_name: &str) -> String {
    pluralize(&model_name.to_lowercase())
}

/// Returns the junction table name for a many-to-many field declared on
/// `owner` pointing at `target`.
pub fn junction_table_name(owner: &str, target: &str) -> String {
    format!("{}_{}", owner.to_lowercase(), default_table_name(target))
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
