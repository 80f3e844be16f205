//! Context-window assembly and the prompt templates used for grounded
//! generation.

use crate::types::RetrievedContext;

/// Window text used when retrieval produced nothing usable.
pub const NO_CONTEXT_WINDOW: &str = "No external docs available.";

/// Maximum snippets echoed back to callers and shown to the judge.
pub const MAX_CONTEXT_SNIPPETS: usize = 3;

/// Maximum scored context previews returned by the configuration test
/// harness.
pub const MAX_CONTEXT_PREVIEW: usize = 5;

/// System prompt applied when the operator supplied none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that uses retrieved enterprise knowledge to answer questions accurately.";

/// The grounding charter appended to every operator system prompt. The
/// model must answer strictly from the retrieved context and say so when
/// the context lacks the answer.
pub const GROUNDING_CHARTER: &str = r#"## ABSOLUTE GROUNDING REQUIREMENT
You must answer questions using ONLY information explicitly present in the provided context.
Every fact, name, number, or detail in your response must be directly traceable to specific text in the context.
Give the answer which is present in the given context only; do not elaborate unless the input asks for it.
When the user greets you, greet the user back with respect.

## CRITICAL RULES - NO EXCEPTIONS

### Rule 1: Hallucination Prevention
- DO NOT generate, infer, assume, or extrapolate any information beyond what is explicitly stated
- DO NOT mention names, numbers, dates, or facts unless they appear in the context
- DO NOT make calculations or derive information unless the context provides it
- DO NOT use general knowledge if the specific information is not in the context

### Rule 2: Singular vs. Multiple Responses
- Questions asking for 'THE' or using singular form require EXACTLY ONE answer
- Questions asking for 'ALL' or using plural form require multiple answers if they exist in context
- Provide multiple answers ONLY when the question explicitly requests multiple OR the context explicitly states a tie
- Default behavior: When in doubt, provide one answer only

### Rule 3: Context Completeness
- Treat the provided context as the complete and only source of information
- DO NOT assume additional data exists beyond what is shown
- If context shows limited or sample data, work only with what is provided

### Rule 4: Answer Precision
- For simple questions: provide simple, direct answers
- For complex questions: provide detailed answers using only context information
- DO NOT add elaboration, examples, lists, or breakdowns unless they are explicitly in the context
- Match the scope of your answer to what the question asks and the context supports

### Rule 5: Handling Insufficient Context
- If context contains the answer: provide it directly
- If context partially answers: provide what you can and acknowledge limitations if relevant
- If context lacks the answer: state the information is not available in the provided context
- NEVER fill gaps with assumptions or general knowledge

## MANDATORY PRE-RESPONSE VERIFICATION
Before responding, verify:
1. Every entity/name I mention is visible in the context
2. Every number I state is present in the context
3. The question asks for one answer or multiple
4. I am not adding information beyond what is stated
5. Each claim is traceable to a specific sentence in the context

## QUALITY PRINCIPLES
- Accuracy over completeness: a brief, correct answer is better than a detailed, partially-invented one
- Faithfulness over helpfulness: staying grounded in context is paramount
- Precision over elaboration: exact answers from context are better than expanded explanations
- Simplicity over complexity: if a simple answer suffices, provide it"#;

/// Deduplicates retrieved chunks by exact trimmed text (first-seen order
/// wins) and joins them into the grounding window.
pub fn build_context_window(chunks: &[RetrievedContext]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut ordered: Vec<&str> = Vec::new();
    for chunk in chunks {
        let text = chunk.text.trim();
        if text.is_empty() || seen.contains(&text) {
            continue;
        }
        seen.push(text);
        ordered.push(text);
    }

    if ordered.is_empty() {
        NO_CONTEXT_WINDOW.to_string()
    } else {
        ordered.join("\n\n")
    }
}

/// First few non-empty hit texts, for response payloads and the judge.
pub fn prepare_context_snippets(chunks: &[RetrievedContext]) -> Vec<String> {
    chunks
        .iter()
        .map(|chunk| chunk.text.trim())
        .filter(|text| !text.is_empty())
        .take(MAX_CONTEXT_SNIPPETS)
        .map(str::to_string)
        .collect()
}

/// Resolves the operator prompt (falling back to the default) and appends
/// the grounding charter.
pub fn build_system_prompt(operator_prompt: Option<&str>) -> String {
    let resolved = operator_prompt
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    format!("{resolved}\n\n{GROUNDING_CHARTER}")
}

/// Renders the user message carrying the question, the context window and
/// a terse grounding reminder.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Question: {question}\n\nContext:\n{context}\n\nIMPORTANT: Answer using ONLY information explicitly stated in the context above. If the question asks for one item, provide one. If it asks for multiple, provide multiple only if they exist in context. Do not add any information not present in the context. Verify each fact against the context before responding."
    )
}
