//! Persona prompt assembly for the simulated client.

use crate::session::Turn;

/// Fixed persona for the AI-played client.
pub const PERSONA: &str = "You are Li Sen. Your uncle may have a hereditary condition \
(Kennedy's disease, SBMA) and you are very worried about it. You are consulting a genetic \
counselor. Your manner is somewhat anxious but polite, and you want every question answered \
clearly.";

/// Family background the persona must never contradict when answering
/// free-form questions.
pub const KNOWN_FACTS: &str = "\
# Known Facts
This is your family background. Every answer must stay strictly consistent with these facts; \
never invent or alter them:
- Your uncle: 50 years old, muscle weakness began 6 years ago, diagnosed with Kennedy's \
disease (SBMA). He has no children.
- Your mother: 47 years old and healthy. She is your grandmother's only child, with no \
siblings.
- Yourself: you have one healthy younger sister.
- Your grandmother: died in a car accident when you were small; she was healthy and never \
showed symptoms like your uncle's.
- Your great-grandfather (your grandmother's father): according to your mother, he had \
symptoms similar to your uncle's.";

const CONSTRAINTS: &str = "Output only your reply as the client (Li Sen), in natural, \
conversational language. Do not add explanations, labels such as \"Client:\", or any \
Markdown.";

/// Prompt for a scripted client turn: persona, the counselor's last line,
/// the node's goal and its example utterances as reference phrasings.
pub fn build_client_prompt(counselor_message: &str, goal: &str, examples: &[String]) -> String {
    let mut reference = String::new();
    if !examples.is_empty() {
        let listed: String = examples
            .iter()
            .map(|ex| format!("- {}\n", ex))
            .collect();
        reference = format!(
            "\n# Reference Responses\nThese are examples of what you could say. Pick one, \
combine them, or produce a similar natural answer.\n{}",
            listed
        );
    }

    format!(
        "# Persona\n{persona}\n\n# Context\nThe counselor just said to you: '{message}'\n\n\
# Goal For This Turn\n{goal}\n{reference}\n# Constraints\n{constraints}",
        persona = PERSONA,
        message = counselor_message,
        goal = goal,
        reference = reference,
        constraints = CONSTRAINTS,
    )
}

/// Prompt for an out-of-band question: persona, the fixed known facts, the
/// full turn history and the ad-hoc question.
pub fn build_custom_question_prompt(question: &str, history: &[Turn]) -> String {
    let rendered = render_history(history);

    format!(
        "# Persona\n{persona}\n\n{facts}\n\n# Context\nSummary of the conversation so \
far:\n{history}\n\n# Goal For This Turn\nInstead of choosing a preset option, the counselor \
has asked you an additional question: '{question}'\n\n# Constraints\nAnswer the counselor's \
question directly and concisely. Your answer must be strictly based on the Known Facts above \
and must not contradict them. {constraints}",
        persona = PERSONA,
        facts = KNOWN_FACTS,
        history = rendered,
        question = question,
        constraints = CONSTRAINTS,
    )
}

fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "(no turns yet)".to_string();
    }
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.speaker.label(), turn.dialogue))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_prompt_contains_all_sections() {
        let prompt = build_client_prompt(
            "Hello, please sit down.",
            "Explain why you came in today",
            &["I'm worried about my uncle's illness.".to_string()],
        );

        assert!(prompt.contains("Li Sen"));
        assert!(prompt.contains("Hello, please sit down."));
        assert!(prompt.contains("Explain why you came in today"));
        assert!(prompt.contains("# Reference Responses"));
        assert!(prompt.contains("I'm worried about my uncle's illness."));
    }

    #[test]
    fn client_prompt_without_examples_skips_reference_block() {
        let prompt = build_client_prompt("Hi", "greet", &[]);
        assert!(!prompt.contains("# Reference Responses"));
    }

    #[test]
    fn custom_prompt_includes_facts_and_history() {
        let history = vec![
            Turn::counselor("Hello."),
            Turn::client("Hi, I'm quite worried."),
        ];
        let prompt = build_custom_question_prompt("How old is your uncle?", &history);

        assert!(prompt.contains("# Known Facts"));
        assert!(prompt.contains("Counselor: Hello."));
        assert!(prompt.contains("Client: Hi, I'm quite worried."));
        assert!(prompt.contains("How old is your uncle?"));
    }

    #[test]
    fn custom_prompt_with_empty_history() {
        let prompt = build_custom_question_prompt("Anything?", &[]);
        assert!(prompt.contains("(no turns yet)"));
    }
}
