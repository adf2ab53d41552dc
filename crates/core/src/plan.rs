//! Application Plan Types
//!
//! The structured proposal the oracle returns during the Planning phase.
//! A plan stays pending on the snapshot until generated code supersedes it.

use serde::{Deserialize, Serialize};

/// A file the plan intends to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedFile {
    pub path: String,
    #[serde(default)]
    pub purpose: String,
}

/// Requirement breakdown by deployment shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementBreakdown {
    #[serde(default)]
    pub backend: Vec<String>,
    #[serde(default)]
    pub frontend: Vec<String>,
    #[serde(default)]
    pub standalone: Vec<String>,
}

impl RequirementBreakdown {
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty() && self.frontend.is_empty() && self.standalone.is_empty()
    }
}

/// A complete application plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPlan {
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub files: Vec<PlannedFile>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub requirements: RequirementBreakdown,
}

impl AppPlan {
    /// Render the plan as markdown for transcripts and prompts.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n{}\n", self.name, self.description);

        if !self.features.is_empty() {
            out.push_str("\n### Features\n");
            for feature in &self.features {
                out.push_str(&format!("- {}\n", feature));
            }
        }

        if !self.files.is_empty() {
            out.push_str("\n### Files\n");
            for file in &self.files {
                if file.purpose.is_empty() {
                    out.push_str(&format!("- `{}`\n", file.path));
                } else {
                    out.push_str(&format!("- `{}`: {}\n", file.path, file.purpose));
                }
            }
        }

        if !self.tech_stack.is_empty() {
            out.push_str(&format!("\n### Tech Stack\n{}\n", self.tech_stack.join(", ")));
        }

        let sections = [
            ("Backend", &self.requirements.backend),
            ("Frontend", &self.requirements.frontend),
            ("Standalone", &self.requirements.standalone),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("\n### {} Requirements\n", title));
            for item in items {
                out.push_str(&format!("- {}\n", item));
            }
        }

        out
    }
}
