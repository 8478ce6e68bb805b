//! Prompt builders and post text composition

/// Seed topics for scheduled posts and keyword searches
pub const KEYWORDS: &[&str] = &[
    "Interview",
    "Software Engineer",
    "Leetcode",
    "System Design",
    "High Level Design",
    "Low Level Design",
    "AI",
    "Blockchain",
    "Crypto",
    "Cloud Computing",
    "DevOps",
    "Microservices",
    "Database",
    "Caching",
    "Operating Systems",
    "Kubernetes",
    "Docker",
    "Machine Learning",
    "Tech News",
    "Agentic Systems",
    "Tech History",
];

const ELLIPSIS: &str = "...";

const VOICE_RULES: &str = "Write like a working engineer, not a marketer. \
Never say you are an AI or a bot. No hashtags. No asterisks or markdown emphasis.";

/// Ask for a narrow, current subtopic of `keyword`
pub fn topic_prompt(keyword: &str) -> String {
    format!(
        "Pick one specific, current subtopic of '{keyword}' that working software engineers \
would want to read about this year. Reply with the subtopic alone, three to five words, \
no quotes and no explanation."
    )
}

/// Ask for a standalone post about `topic`
pub fn post_prompt(topic: &str) -> String {
    format!(
        "You post daily on X about life as a software engineer. Write one post about '{topic}'.\n\
Open with a sharp, slightly contrarian hook about a pain every developer knows. \
Follow with one insight that only comes from shipping real systems, in plain words and \
short sentences. Close with a question or a take people will want to argue with.\n\
Keep it under 200 characters; a link is appended afterwards.\n{VOICE_RULES}"
    )
}

/// Ask for a reply to a tweet found through keyword search
pub fn keyword_reply_prompt(brand: &str, tweet_text: &str) -> String {
    format!(
        "You are {brand}, an engineer who knows software careers, interviews and tech trends.\n\
Someone posted: \"{tweet_text}\"\n\
Reply with something useful: add a fact, a trade-off or a question that moves the \
conversation forward. Be warm and curious rather than preachy. \
Stay under 240 characters.\n{VOICE_RULES}"
    )
}

/// Ask for a reply to a tweet that mentions the account
pub fn mention_reply_prompt(brand: &str, tweet_text: &str) -> String {
    format!(
        "You are {brand}, an engineer who knows software careers, interviews and tech trends.\n\
You were mentioned in this post: \"{tweet_text}\"\n\
If it asks something, answer it directly. If the intent is unclear, ask one short \
clarifying question. Keep a relaxed, friendly tone and stay under 240 characters.\n\
{VOICE_RULES}"
    )
}

/// Ask for an image-generation prompt about `topic`
///
/// `grounding_text` is the post the image will accompany, when known.
pub fn image_prompt_request(topic: &str, grounding_text: Option<&str>) -> String {
    let mut request = format!(
        "Describe a single striking illustration about '{topic}' for a text-to-image model. \
Cover subject, composition, lighting, palette and mood in at least fifty words. \
Favor a clean modern style with bold contrast. The image must contain no text, \
letters or logos."
    );
    if let Some(grounding) = grounding_text.map(str::trim).filter(|g| !g.is_empty()) {
        request.push_str(&format!(
            "\nThe image goes alongside this post, so match its idea: \"{grounding}\""
        ));
    }
    request.push_str("\nAnswer with one paragraph and nothing else.");
    request
}

/// Strip surrounding whitespace, quotes and trailing punctuation from a model-picked topic
pub fn clean_topic(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '.' | ',' | ';' | ':') || c.is_whitespace())
        .to_string()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Append `suffix` to `text`, shortening the body with `...` to stay within `limit` characters
pub fn compose_post_text(text: &str, suffix: &str, limit: usize) -> String {
    let body = text.trim();
    let total = body.chars().count() + suffix.chars().count();
    if total <= limit {
        return format!("{body}{suffix}");
    }

    let available = limit.saturating_sub(suffix.chars().count() + ELLIPSIS.len());
    let shortened = truncate_chars(body, available);
    tracing::warn!(
        "Post text is {} characters, over the {} limit; truncating",
        total,
        limit
    );
    format!("{}{ELLIPSIS}{suffix}", shortened.trim_end())
}
