use serde::{Deserialize, Serialize};

/// 文案模板
///
/// 存放在 `{templates_dir}/{template_id}.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingTemplate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text_template: String,
}
