//! Chat text tasks built on a single completion call
//!
//! Each task formats its input, calls [`LlmService::complete`] once and
//! post-processes the text. Help request extraction asks for a JSON object
//! and decodes it with serde_json.

use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, LlmError, LlmMessage, LlmService};

/// Title used whenever a generated one is unavailable
pub const FALLBACK_CHAT_TITLE: &str = "Help Request Chat";

/// City reported when a help request does not name one
pub const UNSPECIFIED_CITY: &str = "Not specified";

const MAX_TITLE_CHARS: usize = 50;

const MORE_DETAILS_MESSAGE: &str = "Please provide more details about your request. \
    For example: What kind of help do you need? Where is it needed? When is it needed?";

/// Languages supported by message translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Ukrainian,
    English,
}

impl TargetLanguage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ukrainian => "Ukrainian",
            Self::English => "English",
        }
    }
}

/// Translate a chat message, returning only the translated text.
pub async fn translate_message(
    llm: &dyn LlmService,
    text: &str,
    target: TargetLanguage,
) -> Result<String, LlmError> {
    let language = target.display_name();
    let request = CompletionRequest {
        system_prompt: Some(format!(
            "You are a professional translator. Translate the given text to {language}, \
             preserving meaning and tone. Return only the translated text."
        )),
        messages: vec![LlmMessage::user(format!(
            "Translate the following text to {language}:\n\"{text}\""
        ))],
        temperature: Some(0.3),
        ..Default::default()
    };

    let response = llm.complete(request).await?;
    let translated = strip_wrapping_quotes(response.content.trim());
    if translated.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    Ok(translated.to_string())
}

/// One message of a conversation transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub sender_id: String,
    pub text: String,
}

/// Participant of a two-party help conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SummaryInput {
    pub title: Option<String>,
    pub user: Participant,
    pub volunteer: Participant,
    pub messages: Vec<TranscriptLine>,
}

impl SummaryInput {
    /// Render the transcript as `[n] User|Volunteer (name): text` lines
    pub fn render_transcript(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len() + 4);
        if let Some(title) = &self.title {
            lines.push(format!("Conversation Title: {title}"));
        }
        lines.push(format!(
            "Participants: User {} (ID: {}), Volunteer {} (ID: {})",
            self.user.name, self.user.id, self.volunteer.name, self.volunteer.id
        ));
        for (index, message) in self.messages.iter().enumerate() {
            let (role, name) = if message.sender_id == self.user.id {
                ("User", self.user.name.as_str())
            } else {
                ("Volunteer", self.volunteer.name.as_str())
            };
            lines.push(format!("[{}] {role} ({name}): {}", index + 1, message.text));
        }
        lines.join("\n")
    }
}

/// Summarize a help conversation between a user and a volunteer.
pub async fn summarize_conversation(
    llm: &dyn LlmService,
    input: &SummaryInput,
) -> Result<String, LlmError> {
    let request = CompletionRequest {
        system_prompt: Some(
            "You summarize help request conversations. Cover key topics, decisions, \
             action items and the overall status in two to four short paragraphs, \
             written in third person."
                .to_string(),
        ),
        messages: vec![LlmMessage::user(input.render_transcript())],
        temperature: Some(0.5),
        ..Default::default()
    };

    let summary = llm.complete(request).await?.content.trim().to_string();
    if summary.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    Ok(summary)
}

/// Help request context a chat title is generated from
#[derive(Debug, Clone, Default)]
pub struct TitleInput {
    pub city: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl TitleInput {
    fn context_lines(&self) -> Vec<String> {
        [
            ("Location", &self.city),
            ("Category", &self.category),
            ("Request", &self.description),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect()
    }
}

/// Generate a short chat title. Never fails: falls back to [`FALLBACK_CHAT_TITLE`].
pub async fn generate_chat_title(llm: &dyn LlmService, input: &TitleInput) -> String {
    let context = input.context_lines();
    if context.is_empty() {
        return FALLBACK_CHAT_TITLE.to_string();
    }

    let request = CompletionRequest {
        system_prompt: Some(
            "You write concise, descriptive titles (at most 50 characters, no quotes) \
             for help request chats."
                .to_string(),
        ),
        messages: vec![LlmMessage::user(context.join("\n"))],
        ..Default::default()
    };

    match llm.complete(request).await {
        Ok(response) => {
            let title = strip_wrapping_quotes(response.content.trim());
            if title.is_empty() {
                FALLBACK_CHAT_TITLE.to_string()
            } else {
                truncate_title(title)
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chat title generation failed, using fallback");
            FALLBACK_CHAT_TITLE.to_string()
        }
    }
}

/// Kind of help a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HelpCategory {
    Food,
    Transportation,
    Medical,
    Shelter,
    Clothing,
    #[default]
    Other,
}

impl HelpCategory {
    const ALL: [Self; 6] = [
        Self::Food,
        Self::Transportation,
        Self::Medical,
        Self::Shelter,
        Self::Clothing,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transportation => "Transportation",
            Self::Medical => "Medical",
            Self::Shelter => "Shelter",
            Self::Clothing => "Clothing",
            Self::Other => "Other",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|u| u.label().eq_ignore_ascii_case(label))
    }
}

/// Structured help request extracted from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedHelpRequest {
    pub city: String,
    pub category: HelpCategory,
    pub urgency: Urgency,
    pub description: String,
}

/// Model reply before fallbacks. Either the four fields or an error flag with a message.
#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    city: Option<String>,
    category: Option<String>,
    urgency: Option<String>,
    description: Option<String>,
}

impl ExtractionReply {
    fn into_parsed(self) -> Result<ParsedHelpRequest, LlmError> {
        if self.error {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| MORE_DETAILS_MESSAGE.to_string());
            return Err(LlmError::InsufficientInformation(message));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| LlmError::InsufficientInformation(MORE_DETAILS_MESSAGE.to_string()))?;

        let city = self
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("null"))
            .unwrap_or_else(|| UNSPECIFIED_CITY.to_string());

        Ok(ParsedHelpRequest {
            city,
            category: self
                .category
                .as_deref()
                .and_then(HelpCategory::from_label)
                .unwrap_or_default(),
            urgency: self
                .urgency
                .as_deref()
                .and_then(Urgency::from_label)
                .unwrap_or_default(),
            description,
        })
    }
}

/// Extract city, category, urgency and description from a free-form help request.
///
/// Missing city, category or urgency fall back to [`UNSPECIFIED_CITY`],
/// [`HelpCategory::Other`] and [`Urgency::Medium`]. Text too vague to act on
/// yields [`LlmError::InsufficientInformation`] with a message for the user.
pub async fn parse_help_request(
    llm: &dyn LlmService,
    text: &str,
) -> Result<ParsedHelpRequest, LlmError> {
    let request = CompletionRequest {
        system_prompt: Some(extraction_prompt()),
        messages: vec![LlmMessage::user(format!(
            "Parse this help request:\n\"{}\"",
            text.trim()
        ))],
        max_tokens: Some(1000),
        temperature: Some(0.7),
        json_output: true,
        ..Default::default()
    };

    let response = llm.complete(request).await?;
    let content = strip_code_fence(response.content.trim());
    if content.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }

    let reply: ExtractionReply = serde_json::from_str(content)
        .map_err(|e| LlmError::Response(format!("Extraction reply is not a JSON object: {e}")))?;
    let parsed = reply.into_parsed()?;
    tracing::debug!(
        city = %parsed.city,
        category = parsed.category.label(),
        urgency = parsed.urgency.label(),
        "Help request parsed"
    );
    Ok(parsed)
}

fn extraction_prompt() -> String {
    let categories = HelpCategory::ALL.map(|c| c.label()).join(", ");
    let urgencies = Urgency::ALL.map(|u| u.label()).join(", ");
    format!(
        "You extract structured data from free-form help requests. Reply with a single JSON \
         object and nothing else:\n\
         {{\"city\": string or null, \"category\": one of {categories}, \
         \"urgency\": one of {urgencies}, \"description\": string}}\n\
         Use the destination when several cities are named. Infer urgency from phrases such as \
         \"asap\", \"today\" or \"this week\"; default to Medium. The description is the \
         request text, cleaned up.\n\
         If the text is too vague to tell what help is needed, reply instead with \
         {{\"error\": true, \"message\": \"{MORE_DETAILS_MESSAGE}\"}}"
    )
}

/// Unwrap a reply the model wrapped in a markdown code fence
fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| inner.trim_start_matches("json").trim())
        .unwrap_or(text)
}

/// What the assistant knows about the person it is talking to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub role: Option<String>,
    pub language: Option<String>,
}

impl UserContext {
    fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let full_name = [&self.name, &self.surname]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim).filter(|p| !p.is_empty()))
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            lines.push(format!("User name: {full_name}"));
        }
        if let Some(role) = self.role.as_deref().filter(|r| !r.trim().is_empty()) {
            lines.push(format!("User role: {role}"));
        }
        if let Some(language) = self.language.as_deref().filter(|l| !l.trim().is_empty()) {
            lines.push(format!("User language preference: {language}"));
        }
        lines
    }
}

/// Answer the latest turn of a help assistant conversation.
///
/// `history` holds the alternating user and assistant turns, oldest first.
pub async fn chatbot_reply(
    llm: &dyn LlmService,
    history: &[LlmMessage],
    context: &UserContext,
) -> Result<String, LlmError> {
    if history.is_empty() {
        return Err(LlmError::Request(
            "chatbot needs at least one message".to_string(),
        ));
    }

    let mut system_prompt = format!(
        "You are the assistant of HelpHub, a community platform that connects people in need \
         with volunteers. Help users create help requests, help volunteers find ways to help, \
         and answer questions about the platform. Help requests have a category ({}) and an \
         urgency ({}). Users and volunteers talk in chat conversations, in English or Ukrainian. \
         Be friendly and concise; when unsure about a platform detail, say so and give general \
         guidance.",
        HelpCategory::ALL.map(|c| c.label()).join(", "),
        Urgency::ALL.map(|u| u.label()).join(", "),
    );
    let context_lines = context.describe();
    if !context_lines.is_empty() {
        system_prompt.push_str("\n\nUser Information:\n");
        system_prompt.push_str(&context_lines.join("\n"));
    }

    let request = CompletionRequest {
        system_prompt: Some(system_prompt),
        messages: history.to_vec(),
        max_tokens: Some(500),
        temperature: Some(0.7),
        ..Default::default()
    };

    let reply = llm.complete(request).await?.content.trim().to_string();
    if reply.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    Ok(reply)
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

/// Remove one leading and one trailing quote character, if present
fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text
        .strip_prefix('"')
        .or_else(|| text.strip_prefix('\''))
        .unwrap_or(text);
    text.strip_suffix('"')
        .or_else(|| text.strip_suffix('\''))
        .unwrap_or(text)
}
