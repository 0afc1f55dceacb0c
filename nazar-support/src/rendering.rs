//! Text rendering utilities for human-friendly diagnostics.
//!
//! Provides helpers to format dependency chains, shorten type names
//! and produce "did you mean?" suggestions in error output.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use nazar_support::rendering::render_chain;
///
/// let chain = vec!["Widget", "Gadget", "Widget"];
/// assert_eq!(render_chain(&chain), "Widget → Gadget → Widget");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use nazar_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::beans::Widget"), "Widget");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => current_segment.push(ch),
        }
    }

    result.push_str(&current_segment);
    result
}

/// Returns the deployable unit (crate) a type lives in.
///
/// The crate is the first path segment of the type name. Primitive
/// and other root-level names have no crate and yield `""`.
///
/// ```
/// use nazar_support::rendering::crate_of;
///
/// assert_eq!(crate_of("my_app::beans::Widget"), "my_app");
/// assert_eq!(crate_of("alloc::sync::Arc<my_app::Widget>"), "alloc");
/// assert_eq!(crate_of("i32"), "");
/// ```
pub fn crate_of(type_name: &str) -> &str {
    let head = outer_path(type_name);
    match head.find("::") {
        Some(idx) => &head[..idx],
        None => "",
    }
}

/// Returns the module path ("package") of a type, without the type itself.
///
/// ```
/// use nazar_support::rendering::package_of;
///
/// assert_eq!(package_of("my_app::beans::Widget"), "my_app::beans");
/// assert_eq!(package_of("my_app::Widget<my_app::x::Y>"), "my_app");
/// assert_eq!(package_of("u8"), "");
/// ```
pub fn package_of(type_name: &str) -> &str {
    let head = outer_path(type_name);
    match head.rfind("::") {
        Some(idx) => &head[..idx],
        None => "",
    }
}

// Path of the outermost type, generic arguments stripped.
fn outer_path(type_name: &str) -> &str {
    let end = type_name.find('<').unwrap_or(type_name.len());
    &type_name[..end]
}

/// Generates a "did you mean?" suggestion based on registered types.
///
/// Compares the requested type name against available types
/// and suggests close matches, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    // stable: equal scores keep registration order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        let chain = vec!["A", "B", "C", "A"];
        assert_eq!(render_chain(&chain), "A → B → C → A");
    }

    #[test]
    fn render_empty_chain() {
        let chain: Vec<&str> = vec![];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn shorten_with_generics() {
        assert_eq!(
            shorten_type_name("core::option::Option<my_app::beans::Widget>"),
            "Option<Widget>"
        );
    }

    #[test]
    fn shorten_no_path() {
        assert_eq!(shorten_type_name("i32"), "i32");
    }

    #[test]
    fn crate_of_nested_module() {
        assert_eq!(crate_of("widgets::factory::inner::Widget"), "widgets");
    }

    #[test]
    fn crate_of_ignores_generic_arguments() {
        assert_eq!(crate_of("Vec<my_app::Widget>"), "");
    }

    #[test]
    fn package_of_top_level_type() {
        assert_eq!(package_of("widgets::Widget"), "widgets");
    }

    #[test]
    fn suggest_similar_types() {
        let available = vec![
            "my_app::WidgetService",
            "my_app::WidgetRepository",
            "my_app::Database",
        ];

        let suggestions = suggest_similar("WidgetServise", &available, 3);
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].contains("Widget"));
    }

    #[test]
    fn suggest_skips_exact_request() {
        let available = vec!["my_app::Database"];
        assert!(suggest_similar("my_app::Database", &available, 3).is_empty());
    }

    #[test]
    fn suggest_no_match() {
        let available = vec!["my_app::Database"];
        assert!(suggest_similar("XyzAbcDef", &available, 3).is_empty());
    }
}
