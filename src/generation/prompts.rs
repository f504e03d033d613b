//! Prompt text for the answer and synthesis passes.

pub const ANSWER_TEMPERATURE: f32 = 0.3;
pub const SYNTHESIS_TEMPERATURE: f32 = 0.2;

pub const ANSWER_SYSTEM: &str = "You are an expert assistant that provides precise, focused information about civil service rules and regulations, addressing only what was specifically asked.";

pub const SYNTHESIS_SYSTEM: &str = "You are an expert assistant that provides precise, focused responses about civil service rules and regulations. You address ONLY what was specifically asked without including surrounding topics or general context.";

fn source_suffix(document_id: Option<&str>) -> String {
    document_id.map(|d| format!(" from {d}")).unwrap_or_default()
}

/// User prompt asking for an answer grounded in `context`.
#[must_use]
pub fn answer_prompt(query: &str, context: &str, document_id: Option<&str>) -> String {
    let from = source_suffix(document_id);
    format!(
        "QUERY: {query}

CONTEXT{from}: {context}

Please provide a focused and precise answer that addresses ONLY what was specifically asked in the query.
Follow these guidelines:

1. Address ONLY the specific question or request in the query
2. Structure your response with clear headings (## for main headings, ### for subheadings) directly related to the query
3. Use bullet points or numbered lists when appropriate
4. Bold (**text**) important terms, rules, or section numbers mentioned
5. If the query asks for specific points or rules, provide only those points
6. If the exact information requested isn't available in the context, state this clearly

Always cite the source document{from} in your response."
    )
}

/// User prompt asking to merge the retrieved passage with a generated answer.
#[must_use]
pub fn synthesis_prompt(
    query: &str,
    direct_match: &str,
    generated: &str,
    document_id: Option<&str>,
) -> String {
    let from = source_suffix(document_id);
    format!(
        "QUERY: {query}

DIRECT MATCH{from}: {direct_match}

AI RESPONSE: {generated}

Please synthesize the information to provide a precise answer that addresses ONLY what was specifically asked in the query.
Follow these requirements:

1. Focus EXCLUSIVELY on the specific request or question posed
2. Structure your response with headings (## and ###) that directly address the query
3. Use bullet points or numbered lists to make specific information clear
4. Bold (**text**) key points, rules, or sections
5. If the query asks for specific points or requirements, list ONLY those points
6. If the exact information requested isn't available, clearly state this

Always indicate the source document{from} in your response."
    )
}

/// Answer used when generation fails or times out.
#[must_use]
pub fn fallback_answer(passage: &str, document_id: Option<&str>) -> String {
    format!("I found this information{}: {passage}", source_suffix(document_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_answer_names_document() {
        assert_eq!(
            fallback_answer("Ministers receive X.", Some("docA")),
            "I found this information from docA: Ministers receive X."
        );
        assert_eq!(fallback_answer("X.", None), "I found this information: X.");
    }

    #[test]
    fn test_prompts_carry_query_and_context() {
        let p = answer_prompt("what is 3A", "3A. Allowance.", Some("docA"));
        assert!(p.contains("QUERY: what is 3A"));
        assert!(p.contains("CONTEXT from docA: 3A. Allowance."));

        let s = synthesis_prompt("q", "direct", "generated", None);
        assert!(s.contains("DIRECT MATCH: direct"));
        assert!(s.contains("AI RESPONSE: generated"));
    }
}
