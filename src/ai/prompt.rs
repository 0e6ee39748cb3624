use super::{ChatRole, HistoryTurn};

pub const SYSTEM_INSTRUCTION: &str = "\
You are APBIA, a project assistant for students of IFSP Bragança Paulista taking part in \
Bragantec, the campus science and technology fair.

Your job is to:
1. Help students develop good scientific projects
2. Suggest creative and original project ideas
3. Help plan and organise the work
4. Answer questions about scientific methodology
5. Give constructive feedback on ideas and proposals

You can draw on the abstract books of previous Bragantec editions, provided as context.

Be didactic and clear, encouraging, scientific but accessible, creative when suggesting ideas, \
and ethical. Answer in Brazilian Portuguese unless the student writes in another language.";

pub const THINKING_ADDENDUM: &str = "For complex questions, think carefully before answering.";

const CONTEXT_HEADER: &str = "=== CONTEXT (Bragantec abstract books) ===";
const CONTEXT_FOOTER: &str = "=== END OF CONTEXT ===";
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub fn system_instruction(thinking_mode: bool) -> String {
    if thinking_mode {
        format!("{}\n\n{}", SYSTEM_INSTRUCTION, THINKING_ADDENDUM)
    } else {
        SYSTEM_INSTRUCTION.to_string()
    }
}

pub fn format_contexts(contexts: &[String]) -> String {
    contexts.join(CONTEXT_SEPARATOR)
}

/// Student question, preceded by the reference texts when there are any.
pub fn build_prompt(question: &str, contexts: &[String]) -> String {
    let mut prompt = String::new();
    if !contexts.is_empty() {
        prompt.push_str(CONTEXT_HEADER);
        prompt.push('\n');
        prompt.push_str(&format_contexts(contexts));
        prompt.push('\n');
        prompt.push_str(CONTEXT_FOOTER);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Student question: ");
    prompt.push_str(question);
    prompt
}

pub fn build_thinking_prompt(question: &str, contexts: &[String]) -> String {
    let mut prompt = format!(
        "This question calls for careful reflection.\nPlease think it through before answering.\n\nQuestion: {}",
        question
    );
    if !contexts.is_empty() {
        prompt.push_str("\n\nAvailable context:\n");
        prompt.push_str(&format_contexts(contexts));
    }
    prompt
}

/// Messages with an author are the student's; the rest came from the model.
pub fn history_turn(author_id: Option<i64>, text: &str) -> HistoryTurn {
    HistoryTurn {
        role: if author_id.is_some() { ChatRole::User } else { ChatRole::Model },
        text: text.to_string(),
    }
}
