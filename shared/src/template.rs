//! `{{placeholder}}` substitution for certificate and notification templates

use std::collections::HashMap;

/// Replace `{{ key }}` tokens with values from `vars`.
///
/// Unknown keys render as empty strings. An unterminated `{{` is kept verbatim.
pub fn render_placeholders(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholder names referenced by a template, in order of first appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let key = after[..end].trim().to_string();
        if !key.is_empty() && !found.contains(&key) {
            found.push(key);
        }
        rest = &after[end + 2..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_basic() {
        let out = render_placeholders(
            "Hola {{user_name}}, curso {{ course_title }}",
            &vars(&[("user_name", "Ana"), ("course_title", "Alturas")]),
        );
        assert_eq!(out, "Hola Ana, curso Alturas");
    }

    #[test]
    fn test_unknown_key_renders_empty() {
        assert_eq!(render_placeholders("a{{x}}b", &HashMap::new()), "ab");
    }

    #[test]
    fn test_unterminated_is_kept() {
        assert_eq!(render_placeholders("a {{x", &HashMap::new()), "a {{x");
    }

    #[test]
    fn test_placeholders_listed_once() {
        assert_eq!(
            placeholders("{{a}} {{ b }} {{a}}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
