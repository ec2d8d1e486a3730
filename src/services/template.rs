// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

/// Plain-text template with `{{name}}` substitution.
///
/// Unknown placeholders are left as they are. Substituted values are never
/// scanned again, so a value containing `{{other}}` stays literal.
pub struct TextTemplate {
    content: &'static str,
}

impl TextTemplate {
    pub const fn new(content: &'static str) -> Self {
        Self { content }
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut result = String::with_capacity(self.content.len());
        let mut rest = self.content;
        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                rest = &rest[start..];
                break;
            };
            let key = &after_open[..end];
            match vars.iter().find(|(name, _)| *name == key) {
                Some((_, value)) => result.push_str(value),
                None => {
                    result.push_str("{{");
                    result.push_str(key);
                    result.push_str("}}");
                }
            }
            rest = &after_open[end + 2..];
        }
        result.push_str(rest);
        result
    }
}
