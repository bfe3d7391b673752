//! Learning roadmaps
//!
//! Two flavors: a fixed six-week plan for a school subject, and a phased
//! plan built from a learner's goals and constraints.

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::{Error, Result};

use super::{default_language, flexible_text, language_name, require};

const ROADMAP_WEEKS: u32 = 6;

fn default_grade() -> String {
    "10".to_string()
}

/// Parameters for a weekly subject roadmap
#[derive(Debug, Clone, Deserialize)]
pub struct RoadmapRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default = "default_grade", deserialize_with = "flexible_text")]
    pub grade: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapWeek {
    #[serde(default)]
    pub week: u32,
    pub title: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub goal: String,
}

/// A week-by-week plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyRoadmap {
    pub roadmap: Vec<RoadmapWeek>,
    pub language: String,
    pub subject: String,
}

/// What a learner wants and what they have to work with
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProfile {
    #[serde(deserialize_with = "flexible_text")]
    pub goal: String,
    #[serde(deserialize_with = "flexible_text")]
    pub desired_outcome: String,
    #[serde(deserialize_with = "flexible_text")]
    pub skill_level: String,
    #[serde(deserialize_with = "flexible_text")]
    pub background: String,
    #[serde(deserialize_with = "flexible_text")]
    pub hours_per_week: String,
    #[serde(deserialize_with = "flexible_text")]
    pub timeline: String,
    #[serde(deserialize_with = "flexible_text")]
    pub learning_style: String,
    #[serde(deserialize_with = "flexible_text")]
    pub resource_types: String,
    #[serde(deserialize_with = "flexible_text")]
    pub motivation: String,
    #[serde(deserialize_with = "flexible_text")]
    pub constraints: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapResource {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// One phase of a personalized roadmap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapPhase {
    pub title: String,
    pub why: String,
    pub description: String,
    pub tasks: Vec<String>,
    pub milestone: String,
    pub resources: Vec<RoadmapResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedRoadmap {
    #[serde(default)]
    pub overview: String,
    pub steps: Vec<RoadmapPhase>,
    #[serde(default)]
    pub master_checklist: Vec<String>,
    #[serde(default)]
    pub risks: String,
}

fn weekly_prompt(subject: &str, grade: &str, language: &str) -> String {
    format!(
        r#"Create a {ROADMAP_WEEKS}-week learning roadmap for Grade {grade} "{subject}" in {language}.
Return ONLY valid JSON array:
[
  {{
    "week": 1,
    "title": "week title in {language}",
    "topics": ["topic1", "topic2", "topic3"],
    "goal": "what the student will achieve by end of week in {language}"
  }}
]"#
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

fn personalized_prompt(profile: &LearnerProfile, language: &str) -> String {
    format!(
        r#"You are an elite learning strategist and curriculum architect.

Generate a highly personalized, structured learning roadmap based on this user profile:

GOAL: {goal}
DESIRED OUTCOME: {outcome}
SKILL LEVEL: {skill}
BACKGROUND: {background}
TIME AVAILABLE: {hours} hours/week
TIMELINE: {timeline}
LEARNING STYLE: {style}
RESOURCE PREFERENCE: {resources}
MOTIVATION: {motivation}
CURRENT SITUATION: {constraints}

Instructions:
- Break the roadmap into logical phases (4-7 phases depending on timeline)
- Each phase targets the user's specific skill level and time constraints
- Include real YouTube video links and blog or documentation links that are relevant to the topic
- Be specific and avoid generic advice
- Optimize for the user's available hours ({hours} hrs/week)
- If the timeline is short, focus only on high-leverage skills
- Write all text in {language}

Output STRICTLY valid JSON (no markdown, no explanation, only JSON):
{{
  "overview": "A 2-3 sentence personalized learning strategy summary",
  "steps": [
    {{
      "title": "Phase name",
      "why": "Why this phase matters for their specific goal",
      "description": "What they'll learn and accomplish in this phase",
      "tasks": ["specific topic 1", "specific topic 2", "specific topic 3", "specific topic 4"],
      "milestone": "Concrete measurable outcome at end of this phase",
      "resources": [
        {{ "title": "Resource Title", "url": "https://...", "type": "youtube|blog|course" }}
      ]
    }}
  ],
  "masterChecklist": ["Checklist item 1", "Checklist item 2", "Checklist item 3"],
  "risks": "Key risks for this specific person and how to avoid them (2-3 sentences)"
}}"#,
        goal = profile.goal.trim(),
        outcome = or_default(&profile.desired_outcome, "Not specified"),
        skill = or_default(&profile.skill_level, "Not specified"),
        background = or_default(&profile.background, "No prior knowledge"),
        hours = or_default(&profile.hours_per_week, "Not specified"),
        timeline = or_default(&profile.timeline, "Not specified"),
        style = or_default(&profile.learning_style, "Not specified"),
        resources = or_default(&profile.resource_types, "Any"),
        motivation = or_default(&profile.motivation, "Not specified"),
        constraints = or_default(&profile.constraints, "Not specified"),
    )
}

/// Generate a six-week roadmap for a subject
///
/// # Errors
///
/// Returns `InvalidInput` for a blank subject, `InvalidResponse` if no
/// weeks come back, or the completion error
pub async fn generate_weekly_roadmap(
    llm: &LlmClient,
    request: &RoadmapRequest,
) -> Result<WeeklyRoadmap> {
    let subject = require("subject", &request.subject)?;
    let grade = or_default(&request.grade, "10");
    let language = language_name(&request.language);

    let messages = [ChatMessage::user(weekly_prompt(subject, grade, &language))];
    let options = CompletionOptions::new().temperature(0.6).max_tokens(1500);

    let mut roadmap: Vec<RoadmapWeek> = llm.complete_json(&messages, options).await?;
    if roadmap.is_empty() {
        return Err(Error::InvalidResponse("model returned an empty roadmap".to_string()));
    }
    for (week, entry) in (1..).zip(roadmap.iter_mut()) {
        if entry.week == 0 {
            entry.week = week;
        }
    }

    tracing::info!(subject, grade, weeks = roadmap.len(), "weekly roadmap generated");
    Ok(WeeklyRoadmap {
        roadmap,
        language: request.language.clone(),
        subject: subject.to_string(),
    })
}

/// Generate a phased roadmap for a learner profile
///
/// # Errors
///
/// Returns `InvalidInput` without a goal, `InvalidResponse` if no phases
/// come back, or the completion error
pub async fn generate_personalized_roadmap(
    llm: &LlmClient,
    profile: &LearnerProfile,
    language: &str,
) -> Result<PersonalizedRoadmap> {
    require("goal", &profile.goal)?;
    let language = language_name(language);

    let messages = [ChatMessage::user(personalized_prompt(profile, &language))];
    let options = CompletionOptions::new()
        .temperature(0.7)
        .max_tokens(4000)
        .json();

    let roadmap: PersonalizedRoadmap = llm.complete_json(&messages, options).await?;
    if roadmap.steps.is_empty() {
        return Err(Error::InvalidResponse("model returned no roadmap phases".to_string()));
    }

    tracing::info!(phases = roadmap.steps.len(), "personalized roadmap generated");
    Ok(roadmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_request_accepts_numeric_grade() {
        let request: RoadmapRequest =
            serde_json::from_str(r#"{"subject": "Physics", "grade": 9}"#).unwrap();
        assert_eq!(request.grade, "9");
        assert_eq!(request.language, "en");

        let request: RoadmapRequest = serde_json::from_str(r#"{"subject": "Physics"}"#).unwrap();
        assert_eq!(request.grade, "10");
    }

    #[test]
    fn weekly_prompt_mentions_grade_and_language() {
        let text = weekly_prompt("Chemistry", "8", "Telugu");
        assert!(text.starts_with("Create a 6-week learning roadmap for Grade 8 \"Chemistry\" in Telugu."));
    }

    #[test]
    fn profile_fills_placeholders() {
        let profile: LearnerProfile = serde_json::from_str(
            r#"{"goal": "Become a data analyst", "hoursPerWeek": 8, "resourceTypes": ["youtube", "blog"]}"#,
        )
        .unwrap();
        let text = personalized_prompt(&profile, "English");

        assert!(text.contains("GOAL: Become a data analyst"));
        assert!(text.contains("TIME AVAILABLE: 8 hours/week"));
        assert!(text.contains("RESOURCE PREFERENCE: youtube, blog"));
        assert!(text.contains("BACKGROUND: No prior knowledge"));
        assert!(text.contains("DESIRED OUTCOME: Not specified"));
    }

    #[test]
    fn roadmap_parses_camel_case() {
        let roadmap: PersonalizedRoadmap = serde_json::from_str(
            r#"{
                "overview": "Plan",
                "steps": [{"title": "Basics", "resources": [{"title": "Intro", "url": "https://example.com", "type": "blog"}]}],
                "masterChecklist": ["SQL"],
                "risks": "Burnout"
            }"#,
        )
        .unwrap();

        assert_eq!(roadmap.steps[0].resources[0].kind, "blog");
        assert!(roadmap.steps[0].tasks.is_empty());
        assert_eq!(roadmap.master_checklist, ["SQL"]);
    }
}
