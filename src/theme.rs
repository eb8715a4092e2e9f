use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub text_color: String,
    pub node_border: String,
    pub line_color: String,
    pub llm_background: String,
    pub llm_border: String,
    pub env_background: String,
    pub env_border: String,
    pub thought: String,
    pub action: String,
    pub pause: String,
    pub tool: String,
    pub observation: String,
    pub final_answer: String,
    pub exit_color: String,
    pub background: String,
}

impl Theme {
    /// Palette of the ReAct workflow figure.
    pub fn react() -> Self {
        Self {
            font_family: "'Arial Unicode MS', SimHei, 'DejaVu Sans', sans-serif".to_string(),
            text_color: "#000000".to_string(),
            node_border: "#333333".to_string(),
            line_color: "#333333".to_string(),
            llm_background: "#E3F2FD".to_string(),
            llm_border: "#1976D2".to_string(),
            env_background: "#F3E5F5".to_string(),
            env_border: "#7B1FA2".to_string(),
            thought: "#FFF9C4".to_string(),
            action: "#FFECB3".to_string(),
            pause: "#FFCDD2".to_string(),
            tool: "#E1BEE7".to_string(),
            observation: "#C5CAE9".to_string(),
            final_answer: "#C8E6C9".to_string(),
            exit_color: "#4CAF50".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    /// Named font families, in preference order, without generic fallbacks.
    pub fn named_families(&self) -> Vec<String> {
        split_families(&self.font_family)
            .into_iter()
            .filter(|name| !is_generic_family(name))
            .collect()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::react()
    }
}

/// Splits a CSS font-family list, dropping quotes and empty entries.
pub(crate) fn split_families(font_family: &str) -> Vec<String> {
    font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub(crate) fn is_generic_family(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy" | "system-ui"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_family_lists() {
        assert_eq!(
            split_families("'Arial Unicode MS', \"SimHei\" ,sans-serif,"),
            vec!["Arial Unicode MS", "SimHei", "sans-serif"]
        );
    }

    #[test]
    fn named_families_strip_quotes_and_generics() {
        let theme = Theme::react();
        assert_eq!(
            theme.named_families(),
            vec!["Arial Unicode MS", "SimHei", "DejaVu Sans"]
        );
    }
}
