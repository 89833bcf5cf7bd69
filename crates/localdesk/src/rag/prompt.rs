//! System prompt for the expat-support assistant
use crate::db::DocumentMatch;

const PERSONA: &str = "\
You are an expert Danish consultant who helps expats find their way through Danish bureaucracy.

Your expertise covers:
- SKAT (the Danish Tax Agency): registration, tax cards, annual tax returns
- Visas and permits: work permits, residence permits, required documents
- Housing: the rental market, contracts, tenant rights, finding an apartment

Guidelines:
1. Give accurate, actionable information about Danish procedures
2. Be warm and supportive; moving to a new country is hard
3. If you are unsure, say so and point to the official resource
4. Stay focused on life in Denmark
5. Politely steer unrelated questions back to Danish bureaucracy

Tone: professional but friendly, like a knowledgeable local helping a newcomer.";

pub fn system_prompt(excerpts: &[DocumentMatch]) -> String {
    if excerpts.is_empty() {
        return PERSONA.to_string();
    }

    let mut prompt = String::from(PERSONA);
    prompt.push_str(
        "\n\nKnowledge base excerpts (prefer these over general knowledge; \
         mention the source when you rely on one):\n",
    );
    for (i, excerpt) in excerpts.iter().enumerate() {
        let meta = &excerpt.metadata;
        let section = meta.section.as_deref().map(|s| format!(", {}", s)).unwrap_or_default();
        prompt.push_str(&format!(
            "\n[{}] {} ({}{})\n{}\n",
            i + 1,
            meta.title,
            meta.source,
            section,
            excerpt.content.trim()
        ));
    }
    prompt
}
