use std::fmt::Write;

use super::context::recent;
use crate::models::{ChatMessage, ScoredProduct};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful product expert for architectural and building materials.";

const MAX_PROMPT_PRODUCTS: usize = 10;
const DESCRIPTION_CHARS: usize = 200;
const CERT_NAME_CHARS: usize = 30;

/// Keep user/assistant turns only, the last few of them, verbatim.
pub fn sanitize_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let turns: Vec<ChatMessage> = history
        .iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .cloned()
        .collect();
    recent(&turns).to_vec()
}

/// System message, recent history, then the rendered prompt as the user turn.
pub fn build_messages(
    query: &str,
    products: &[ScoredProduct],
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new("system", SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::new("user", build_chat_prompt(query, products, history)));
    messages
}

pub fn build_chat_prompt(query: &str, products: &[ScoredProduct], history: &[ChatMessage]) -> String {
    let mut history_text = String::new();
    for msg in recent(history) {
        let _ = write!(history_text, "\n{}: {}\n", msg.role.to_uppercase(), msg.content);
    }
    if history_text.is_empty() {
        history_text.push_str("None - this is the first message");
    }

    format!(
        r#"You are a knowledgeable assistant helping architects and designers find building products and materials.

CONVERSATION HISTORY:
{history_text}

CURRENT USER QUERY: {query}

PRODUCTS RELEVANT TO THIS QUERY:
{products_summary}

YOUR TASK:
- Read the conversation history carefully to understand the context
- If this is a follow-up question (like "what about pricing" or "tell me more"), refer back to products previously discussed
- Answer the user's current query in a helpful, conversational tone
- When recommending products, include 3-5 most relevant items with brief explanations
- Include pricing information when available or when asked
- Highlight key differentiators (sustainability, technical specs, price, certifications, etc.) based on what matters for the query
- For comparison questions, provide clear side-by-side insights
- If asked about products mentioned earlier, use those product IDs from the history and current product list
- Keep responses concise but informative (2-3 paragraphs max)
- Use bullet points for product recommendations with this format: • Manufacturer — Product Name (ID: X)

IMPORTANT: If the user asks a follow-up question about products you already recommended (e.g., pricing, more details, comparisons), use the conversation history to understand which products they're referring to, even if those exact products aren't in the current search results.

Respond naturally as a product expert would."#,
        products_summary = summarize_products(products),
    )
}

fn summarize_products(products: &[ScoredProduct]) -> String {
    let mut out = String::new();
    for (i, scored) in products.iter().take(MAX_PROMPT_PRODUCTS).enumerate() {
        let p = &scored.product;
        let _ = write!(
            out,
            "\n{}. **{} - {}** (ID: {})\n",
            i + 1,
            p.manufacturer_name.as_deref().unwrap_or("Unknown"),
            p.product_name.as_deref().unwrap_or("Unknown"),
            p.id
        );

        if let Some(desc) = &p.product_description {
            let cut = truncate_chars(desc, DESCRIPTION_CHARS);
            if cut.len() < desc.len() {
                let _ = writeln!(out, "   {cut}...");
            } else {
                let _ = writeln!(out, "   {cut}");
            }
        }

        let mut features: Vec<String> = Vec::new();
        if let Some(category) = p.product_categories.first().and_then(|c| c.category_name.as_deref()) {
            features.push(category.to_string());
        }
        if let Some(price) = p.price() {
            features.push(format!("Price: {price}"));
        }
        if p.has_certifications() {
            let names: Vec<String> = p
                .certifications
                .iter()
                .take(2)
                .map(|c| truncate_chars(c.certification.as_deref().unwrap_or_default(), CERT_NAME_CHARS))
                .collect();
            features.push(format!("Certs: {}", names.join(", ")));
        }
        if let Some(years) = &p.expected_lifespan_years {
            features.push(format!("{years}yr lifespan"));
        }
        if let Some(lead) = &p.lead_time {
            features.push(format!("Lead time: {lead}"));
        }
        if !features.is_empty() {
            let _ = writeln!(out, "   {}", features.join(" | "));
        }
    }
    out
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
