use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a source video worked, as extracted by the model.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub hook_strategy: String,
    pub retention_tactics: Vec<String>,
    pub emotional_triggers: Vec<String>,
    pub structure_breakdown: String,
    pub viral_factor: String,
    pub tone_style: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub title: String,
    pub premise: String,
    pub target_audience: String,
    // intended range is 1-100, kept as the model returned it
    pub predicted_viral_score: f64,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub title: String,
    #[schemars(length(min = 1))]
    pub sections: Vec<Section>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub heading: String,
    pub content: String,
    pub visual_cue: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Input,
    Analyzing,
    AnalysisReady,
    Ideating,
    IdeasReady,
    Scripting,
    ScriptReady,
}

impl Stage {
    /// Position in the three-step progress header, if the stage belongs to one.
    pub fn step(self) -> Option<usize> {
        match self {
            Stage::Input => None,
            Stage::Analyzing | Stage::AnalysisReady => Some(1),
            Stage::Ideating | Stage::IdeasReady => Some(2),
            Stage::Scripting | Stage::ScriptReady => Some(3),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Analyzing => "analyzing",
            Stage::AnalysisReady => "analysis-ready",
            Stage::Ideating => "ideating",
            Stage::IdeasReady => "ideas-ready",
            Stage::Scripting => "scripting",
            Stage::ScriptReady => "script-ready",
        };
        f.write_str(name)
    }
}

/// Artifacts accumulated by one pass through the workflow.
#[derive(Default, Clone, Debug)]
pub struct WorkflowState {
    pub stage: Stage,
    pub source_text: String,
    pub analysis: Option<Analysis>,
    pub ideas: Vec<Idea>,
    pub selected_idea: Option<Idea>,
    pub script: Option<Script>,
}
