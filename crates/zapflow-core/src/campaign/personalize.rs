//! Message personalization

use regex::Regex;
use zapflow_storage::models::Contact;

/// Substitutes the contact's name for the `[nome]` placeholder (`[name]`
/// is accepted too, any letter case)
pub struct Personalizer {
    placeholder: Regex,
}

impl Default for Personalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Personalizer {
    /// Create a new personalizer
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"(?i)\[\s*(nome|name)\s*\]").unwrap(),
        }
    }

    /// Render the template for one contact. A blank name renders as empty.
    pub fn render(&self, template: &str, contact: &Contact) -> String {
        self.render_name(template, contact.name.trim())
    }

    fn render_name(&self, template: &str, name: &str) -> String {
        self.placeholder
            .replace_all(template, regex::NoExpand(name))
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_name() {
        let p = Personalizer::new();
        assert_eq!(p.render_name("Olá [nome], tudo bem?", "Ana"), "Olá Ana, tudo bem?");
        assert_eq!(p.render_name("Hi [Name]! [NOME]", "Bo"), "Hi Bo! Bo");
    }

    #[test]
    fn test_blank_name_is_empty_substitution() {
        let p = Personalizer::new();
        assert_eq!(p.render_name("Oi [nome]!", ""), "Oi !");
    }

    #[test]
    fn test_name_with_dollar_is_literal() {
        let p = Personalizer::new();
        assert_eq!(p.render_name("Oi [nome]", "$1 Silva"), "Oi $1 Silva");
    }

    #[test]
    fn test_template_without_placeholder() {
        let p = Personalizer::new();
        assert_eq!(p.render_name("Promo today", "Ana"), "Promo today");
    }
}
