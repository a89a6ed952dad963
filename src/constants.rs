// Defaults for the completion provider and the web front-end.
// Values that operators commonly override are read from the environment once.

use std::env;

lazy_static::lazy_static! {
    pub static ref GROQ_API_URL: String = env::var("GROQ_API_URL").unwrap_or_else(|_| "https://api.groq.com/openai/v1/chat/completions".to_string());
    pub static ref CHAT_MODEL: String = env::var("GROQ_CHAT_MODEL").unwrap_or_else(|_| "deepseek-r1-distill-llama-70b".to_string());
}

/// Environment variable holding the provider credential.
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TOP_P: f32 = 1.0;

pub const DEFAULT_PORT: u16 = 8501;

/// Sessions untouched for this long are dropped along with their history.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

pub const SESSION_COOKIE: &str = "groq_chat_session";

/// Prepended to every completion request. Never stored in a conversation.
pub const SYSTEM_PROMPT: &str = "You are a friendly and knowledgeable AI assistant who can help with any topic. IMPORTANT RULES:
1. NEVER show your thinking process or include any meta tags
2. NEVER mention that you are an AI model or any specific model name
3. Just respond directly and naturally to questions
4. You can discuss ANY topic - science, arts, history, entertainment, daily life, etc.
5. Respect the user's text formatting:
   - If they provide options on separate lines, address each option separately
   - Preserve their line breaks in your response when appropriate
   - Use line breaks in your response for better readability
6. Use markdown formatting for better readability:
   - Use ## for section headings
   - Use bullet points (-)
   - Use **bold** for emphasis
   - Use `quotes` for special terms
   - Use > for important quotes or highlights
7. Keep responses clear and well-structured
8. Be warm, friendly and conversational";
