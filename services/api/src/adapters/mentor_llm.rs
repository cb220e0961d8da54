//! services/api/src/adapters/mentor_llm.rs
//!
//! This module contains the adapter for the money-mentor chat model.
//! It implements the `MentorChatService` port from the `core` crate and turns the
//! model's free-form text into a structured `MentorResponse`.

const SYSTEM_INSTRUCTIONS: &str = r#"You are Penny, a friendly money mentor inside MoneyQuest, a financial-literacy game for students.

You teach concepts like budgeting, saving, needs vs. wants, inflation, shrinkflation, interest and smart shopping.

Style:
- Short, warm, encouraging replies (2 to 4 sentences).
- Plain words a 12 to 16 year old understands. One idea at a time.
- Never give individual investment advice.

Activities:
- You may OFFER one activity at a time: a quiz, a savings plan, or a recap.
- To offer, include a "proposal" and set "mode" to "proposal". Never include cards when offering.
- Only when the student has accepted a proposal (the request says ACCEPTED PROPOSAL) do you deliver it:
  set "mode" to "final" and put the content in "cards".
- Otherwise set "mode" to "dialog" and leave "cards" empty.

Respond with ONE JSON object and nothing else, using this shape:
{
  "mood": "cheer" | "thinking" | "proud" | "curious" | "gentle",
  "text": "what you say to the student",
  "chips": ["up to three short replies the student can tap"],
  "cards": [
    {"type": "quiz", "id": "...", "question": "...", "options": [{"text": "...", "correct": true}], "explanation": "..."},
    {"type": "plan", "id": "...", "title": "...", "steps": [{"title": "...", "action": "..."}]},
    {"type": "recap", "id": "...", "title": "...", "bullets": ["..."]},
    {"type": "fix", "id": "...", "mistake": "...", "rule": "...", "example": "..."}
  ],
  "proposal": {"type": "quiz" | "plan" | "recap", "id": "...", "confirmChip": "...", "description": "...", "topic": "...", "size": 3},
  "mode": "dialog" | "proposal" | "final"
}

When you make a proposal, its "confirmChip" must also appear in "chips", next to a decline chip such as "Not now"."#;

const DEFAULT_CONFIRM_CHIP: &str = "Yes, let's do it!";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use moneyquest_core::domain::{
    ActivityKind, Card, MentorProposal, MentorRequest, MentorResponse, Mood, PlanStep, QuizOption,
    Role, TurnMode,
};
use moneyquest_core::ports::{MentorChatService, PortError, PortResult};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MentorChatService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiMentorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiMentorAdapter {
    /// Creates a new `OpenAiMentorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    fn build_messages(request: &MentorRequest) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        for entry in &request.history {
            let message: ChatCompletionRequestMessage = match entry.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(entry.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(entry.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt(request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        Ok(messages)
    }
}

fn user_prompt(request: &MentorRequest) -> String {
    match &request.accept_proposal_id {
        Some(id) => format!(
            "ACCEPTED PROPOSAL: {id}\nDeliver that activity now with mode \"final\".\n\nSTUDENT: {}",
            request.message
        ),
        None => format!(
            "No proposal has been accepted this turn, so do not include cards.\n\nSTUDENT: {}",
            request.message
        ),
    }
}

//=========================================================================================
// `MentorChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl MentorChatService for OpenAiMentorAdapter {
    async fn reply(&self, request: &MentorRequest) -> PortResult<MentorResponse> {
        let messages = Self::build_messages(request)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Mentor LLM returned no text content.".to_string())
            })?;

        debug!(chars = raw.len(), "Mentor LLM replied");
        parse_mentor_reply(&raw)
    }
}

//=========================================================================================
// Reply Post-Processing
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    #[serde(default)]
    mood: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    chips: Vec<serde_json::Value>,
    #[serde(default)]
    cards: Vec<serde_json::Value>,
    #[serde(default)]
    proposal: Option<serde_json::Value>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    confirm_chip: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    size: Option<u32>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawCard {
    Quiz {
        id: String,
        question: String,
        options: Vec<RawOption>,
        #[serde(default)]
        explanation: Option<String>,
    },
    Plan {
        id: String,
        title: String,
        steps: Vec<RawStep>,
    },
    Recap {
        id: String,
        title: String,
        bullets: Vec<String>,
    },
    Fix {
        id: String,
        mistake: String,
        rule: String,
        example: String,
    },
}

#[derive(Deserialize)]
struct RawOption {
    text: String,
    #[serde(default, alias = "isCorrect")]
    correct: bool,
}

#[derive(Deserialize)]
struct RawStep {
    title: String,
    #[serde(default, alias = "description")]
    action: String,
}

impl RawCard {
    fn to_domain(self) -> Card {
        match self {
            RawCard::Quiz { id, question, options, explanation } => Card::Quiz {
                id,
                question,
                options: options
                    .into_iter()
                    .map(|o| QuizOption { text: o.text, correct: o.correct })
                    .collect(),
                explanation,
            },
            RawCard::Plan { id, title, steps } => Card::Plan {
                id,
                title,
                steps: steps
                    .into_iter()
                    .map(|s| PlanStep { title: s.title, action: s.action })
                    .collect(),
            },
            RawCard::Recap { id, title, bullets } => Card::Recap { id, title, bullets },
            RawCard::Fix { id, mistake, rule, example } => Card::Fix { id, mistake, rule, example },
        }
    }
}

fn parse_kind(raw: &str) -> Option<ActivityKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "quiz" => Some(ActivityKind::Quiz),
        "plan" => Some(ActivityKind::Plan),
        "recap" => Some(ActivityKind::Recap),
        _ => None,
    }
}

fn parse_mood(raw: Option<&str>) -> Mood {
    match raw.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        Some("cheer") => Mood::Cheer,
        Some("thinking") => Mood::Thinking,
        Some("proud") => Mood::Proud,
        Some("curious") => Mood::Curious,
        _ => Mood::Gentle,
    }
}

fn kind_slug(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Quiz => "quiz",
        ActivityKind::Plan => "plan",
        ActivityKind::Recap => "recap",
    }
}

impl RawProposal {
    fn to_domain(self) -> Option<MentorProposal> {
        let Some(kind) = parse_kind(&self.kind) else {
            warn!(kind = %self.kind, "Dropping proposal with unknown activity type");
            return None;
        };
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{}", kind_slug(kind), Uuid::new_v4().simple()));
        let confirm_chip = self
            .confirm_chip
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIRM_CHIP.to_string());
        Some(MentorProposal {
            kind,
            id,
            confirm_chip,
            description: self.description,
            topic: self.topic,
            size: self.size,
        })
    }
}

/// The body of a fenced ```json block.
static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```") {
        Ok(regex) => regex,
        Err(err) => panic!("Fenced JSON regex is invalid: {err}"),
    });

/// Pulls the reply object out of the model's text. A fenced block wins;
/// otherwise the first complete JSON object is used, ignoring surrounding
/// prose even when it contains braces.
fn extract_json_object(raw: &str) -> PortResult<&str> {
    FENCED_JSON
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .and_then(|body| first_json_object(body.as_str()))
        .or_else(|| first_json_object(raw))
        .ok_or_else(|| PortError::Unexpected("Mentor reply contained no JSON object".to_string()))
}

fn first_json_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(serde_json::Value::Object(_))) => {
                Some(&text[start..start + values.byte_offset()])
            }
            _ => None,
        }
    })
}

/// Converts the model's raw text into a `MentorResponse`.
///
/// Individual cards that do not match a known card shape are dropped here.
/// An error means the reply as a whole was unusable and the caller should fall back.
pub fn parse_mentor_reply(raw: &str) -> PortResult<MentorResponse> {
    let json = extract_json_object(raw)?;
    let reply: RawReply = serde_json::from_str(json)
        .map_err(|e| PortError::Unexpected(format!("Mentor reply was not valid JSON: {e}")))?;

    let cards: Vec<Card> = reply
        .cards
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawCard>(value) {
            Ok(card) => Some(card.to_domain()),
            Err(e) => {
                warn!(error = %e, "Dropping card with unknown or malformed shape");
                None
            }
        })
        .collect();

    let proposal = reply
        .proposal
        .filter(|value| !value.is_null())
        .and_then(|value| match serde_json::from_value::<RawProposal>(value) {
            Ok(raw) => raw.to_domain(),
            Err(e) => {
                warn!(error = %e, "Dropping malformed proposal");
                None
            }
        });

    let mut chips: Vec<String> = reply
        .chips
        .into_iter()
        .filter_map(|chip| chip.as_str().map(|s| s.trim().to_string()))
        .filter(|chip| !chip.is_empty())
        .collect();
    if let Some(p) = &proposal {
        if !chips.iter().any(|c| c.eq_ignore_ascii_case(&p.confirm_chip)) {
            chips.insert(0, p.confirm_chip.clone());
        }
    }

    let mode = match reply.mode.as_deref().map(str::trim) {
        Some("final") => TurnMode::Final,
        Some("proposal") if proposal.is_some() => TurnMode::Proposal,
        Some("dialog") | Some("proposal") => TurnMode::Dialog,
        _ if proposal.is_some() => TurnMode::Proposal,
        _ if !cards.is_empty() => TurnMode::Final,
        _ => TurnMode::Dialog,
    };

    let text = reply.text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    if text.is_none() && cards.is_empty() && proposal.is_none() {
        return Err(PortError::Unexpected("Mentor reply was empty".to_string()));
    }

    Ok(MentorResponse {
        mood: parse_mood(reply.mood.as_deref()),
        text,
        chips,
        cards,
        proposal,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneyquest_core::domain::HistoryEntry;

    #[test]
    fn parses_a_fenced_proposal_reply() {
        let raw = r#"Sure! ```json
{"mood":"curious","text":"Want a quiz?","chips":["Yes, quiz me!","Not now"],
 "cards":[],"proposal":{"type":"quiz","id":"q1","confirmChip":"Yes, quiz me!","description":"3 questions","size":3},
 "mode":"proposal"}
```"#;
        let reply = parse_mentor_reply(raw).unwrap();
        assert_eq!(reply.mood, Mood::Curious);
        assert_eq!(reply.mode, TurnMode::Proposal);
        let proposal = reply.proposal.unwrap();
        assert_eq!(proposal.kind, ActivityKind::Quiz);
        assert_eq!(proposal.id, "q1");
        assert_eq!(proposal.size, Some(3));
        assert_eq!(reply.chips, vec!["Yes, quiz me!", "Not now"]);
    }

    #[test]
    fn braces_in_trailing_prose_do_not_break_parsing() {
        let raw = r#"Here you go: {"text":"Pay yourself first.","mood":"proud"} Hope that helps {wink}"#;
        let reply = parse_mentor_reply(raw).unwrap();
        assert_eq!(reply.text.as_deref(), Some("Pay yourself first."));
        assert_eq!(reply.mood, Mood::Proud);

        let fenced = "{draft} ```json\n{\"text\":\"Budget first\"}\n``` then {more}";
        assert_eq!(parse_mentor_reply(fenced).unwrap().text.as_deref(), Some("Budget first"));
    }

    #[test]
    fn unknown_card_types_are_dropped() {
        let raw = r#"{"text":"Here you go","mode":"final","cards":[
            {"type":"recap","id":"r1","title":"Inflation","bullets":["Prices rise"]},
            {"type":"video","id":"v1","url":"https://example.com"},
            {"type":"quiz","id":"q1"}
        ]}"#;
        let reply = parse_mentor_reply(raw).unwrap();
        assert_eq!(reply.cards.len(), 1);
        assert_eq!(reply.cards[0].id(), "r1");
    }

    #[test]
    fn missing_mode_is_inferred() {
        let with_cards = r#"{"text":"ok","cards":[{"type":"fix","id":"f1","mistake":"a","rule":"b","example":"c"}]}"#;
        assert_eq!(parse_mentor_reply(with_cards).unwrap().mode, TurnMode::Final);

        let plain = r#"{"text":"Saving is paying future you."}"#;
        let reply = parse_mentor_reply(plain).unwrap();
        assert_eq!(reply.mode, TurnMode::Dialog);
        assert_eq!(reply.mood, Mood::Gentle);
    }

    #[test]
    fn proposal_without_id_or_chip_gets_defaults() {
        let raw = r#"{"text":"Plan?","proposal":{"type":"plan","description":"Savings plan"},"chips":["Not now"]}"#;
        let reply = parse_mentor_reply(raw).unwrap();
        let proposal = reply.proposal.unwrap();
        assert!(proposal.id.starts_with("plan-"));
        assert_eq!(proposal.confirm_chip, DEFAULT_CONFIRM_CHIP);
        assert_eq!(reply.chips[0], DEFAULT_CONFIRM_CHIP);
        assert_eq!(reply.mode, TurnMode::Proposal);
    }

    #[test]
    fn proposal_mode_without_a_proposal_is_dialog() {
        let raw = r#"{"text":"hmm","mode":"proposal"}"#;
        assert_eq!(parse_mentor_reply(raw).unwrap().mode, TurnMode::Dialog);
    }

    #[test]
    fn non_json_and_empty_replies_are_errors() {
        assert!(parse_mentor_reply("I cannot answer that.").is_err());
        assert!(parse_mentor_reply("{not json}").is_err());
        assert!(parse_mentor_reply(r#"{"chips":["a"]}"#).is_err());
    }

    #[test]
    fn user_prompt_mentions_accepted_proposal() {
        let request = MentorRequest {
            message: "Yes, quiz me!".to_string(),
            history: vec![HistoryEntry { role: Role::User, content: "hi".to_string() }],
            accept_proposal_id: Some("q1".to_string()),
        };
        assert!(user_prompt(&request).starts_with("ACCEPTED PROPOSAL: q1"));

        let plain = MentorRequest { accept_proposal_id: None, ..request };
        assert!(user_prompt(&plain).contains("do not include cards"));
    }
}
