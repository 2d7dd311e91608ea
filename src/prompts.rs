pub const THEME_SYSTEM: &str = include_str!("../data/prompts/theme_system.txt");
pub const THEME_USER: &str = include_str!("../data/prompts/theme_user.txt");
pub const BOARD_IMAGE: &str = include_str!("../data/prompts/board_image.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.trim_end().to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Render items as an indented markdown-style bullet list.
pub fn bullet_list<S: AsRef<str>>(items: &[S], indent: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}- {}", indent, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Hello {{name}}!", &[("name", "world")]),
            "Hello world!"
        );
    }

    #[test]
    fn test_render_multiple_vars() {
        assert_eq!(
            render("{{a}} and {{b}}", &[("a", "cats"), ("b", "dogs")]),
            "cats and dogs"
        );
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(bullet_list(&["a", "b"], ""), "- a\n- b");
        assert_eq!(bullet_list(&["a"], "  "), "  - a");
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!THEME_SYSTEM.trim().is_empty());
        assert!(!THEME_USER.trim().is_empty());
        assert!(!BOARD_IMAGE.trim().is_empty());
    }

    #[test]
    fn test_theme_user_has_goals_placeholder() {
        assert!(THEME_USER.contains("{{goals}}"));
    }

    #[test]
    fn test_board_image_has_placeholders() {
        assert!(BOARD_IMAGE.contains("{{goals}}"));
        assert!(BOARD_IMAGE.contains("{{elements}}"));
    }
}
