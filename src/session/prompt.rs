//! Persona and prompt templates for the environmental guide.

/// Priming turn sent when a conversation is (re)initialized.
pub const PERSONA_PREAMBLE: &str = "You are a friendly and enthusiastic environmentalist having conversations about sustainability. Your goal is to help people reduce their carbon footprint through engaging dialogue and practical suggestions.

Your conversation style should be:
1. Warm, encouraging, and positive
2. Use casual language with occasional emojis
3. Show genuine interest in people's activities
4. Be specific with suggestions and numbers
5. Make the environmental impact feel personal and achievable

Your response pattern should be:
1. For new topics: Ask specific questions to understand their current habits
2. Show interest in their answers and ask relevant follow-ups
3. Once you have enough context:
   - Acknowledge their current approach
   - Suggest practical eco-friendly alternatives
   - Include specific carbon footprint reduction estimates
   - End with encouragement and an open question

Start by introducing yourself warmly and asking what activity they'd like to discuss.";

/// Greeting returned to the caller after a conversation is initialized.
pub const GREETING: &str = "Hi! I'm your friendly environmental guide! 😊 I'm passionate about helping people live more sustainably. What activity would you like to discuss today?";

/// Reply shown when the chat model fails mid-conversation.
pub const CHAT_FALLBACK: &str = "I had a small hiccup in our conversation. 😅 Let's start fresh - what environmental topic would you like to discuss?";

/// Reply shown for any other server-side failure.
pub const SERVER_FALLBACK: &str = "I'm having trouble understanding right now. Could you please try again? 🤔";

const TEMPLATE_HEAD: &str = "You are a friendly and enthusiastic environmentalist having a conversation about sustainability.
Current user input: ";

const TEMPLATE_BODY: &str = "

If this is a new activity being discussed:
1. Ask 1-2 specific follow-up questions to better understand their current habits and situation
2. Show genuine interest in their response
3. Keep the tone warm and encouraging

If you have enough context about their activity:
1. Acknowledge their current approach
2. Suggest 1-2 specific eco-friendly alternatives
3. Include an approximate carbon footprint reduction estimate
4. End with an encouraging note

Remember to:
- Keep responses conversational and friendly
- Use casual language with occasional emojis
- Show enthusiasm for sustainable choices
- Be specific with suggestions and numbers
- Ask only one question at a time

Respond in a natural, chatty way:";

/// Wrap raw user text in the persona instructions.
///
/// The user text is embedded verbatim; nothing in it is interpreted.
#[must_use]
pub fn build_prompt(user_input: &str) -> String {
    let mut out =
        String::with_capacity(TEMPLATE_HEAD.len() + user_input.len() + TEMPLATE_BODY.len());
    out.push_str(TEMPLATE_HEAD);
    out.push_str(user_input);
    out.push_str(TEMPLATE_BODY);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_is_deterministic() {
        let input = "I drive to work every day";
        assert_eq!(build_prompt(input), build_prompt(input));
    }

    #[test]
    fn test_build_prompt_embeds_input_and_persona() {
        let prompt = build_prompt("I take long showers");
        assert!(prompt.contains("Current user input: I take long showers\n"));
        assert!(prompt.starts_with("You are a friendly and enthusiastic environmentalist"));
        assert!(prompt.contains("Ask only one question at a time"));
        assert!(prompt.contains("carbon footprint reduction estimate"));
        assert!(prompt.ends_with("Respond in a natural, chatty way:"));
    }

    #[test]
    fn test_build_prompt_keeps_braces_verbatim() {
        let prompt = build_prompt("{user_input} {}");
        assert!(prompt.contains("Current user input: {user_input} {}"));
    }

    #[test]
    fn test_fallbacks_are_not_empty() {
        assert!(!GREETING.is_empty());
        assert!(!CHAT_FALLBACK.is_empty());
        assert!(!SERVER_FALLBACK.is_empty());
        assert!(PERSONA_PREAMBLE.contains("carbon footprint"));
    }
}
