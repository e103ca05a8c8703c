//! Search planning: which groups to search and with which terms.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::BusinessContext;

pub const MAX_SEARCH_TERMS: usize = 25;
pub const DEFAULT_GROUP_LIMIT: usize = 8;

const HIGH_INTENT_TERMS: &[&str] = &[
    "best tool for",
    "recommend tool",
    "looking for software",
    "need solution",
    "what tool should",
    "any good tools",
    "help me find",
    "suggestions for tools",
];

const PROBLEM_PREFIXES: &[&str] = &["struggling with", "having trouble with"];

const SOLUTION_TERMS: &[&str] = &[
    "alternative to",
    "better than",
    "replacement for",
    "similar to",
    "free alternative",
    "open source",
    "budget friendly",
];

const QUESTION_TERMS: &[&str] = &[
    "how do i",
    "what is the best",
    "can anyone recommend",
    "does anyone know",
    "has anyone tried",
    "what do you use",
];

/// Category → default groups. A category applies when its name or one of its
/// hint words appears in the industry label.
const CATEGORY_GROUPS: &[(&str, &[&str], &[&str])] = &[
    (
        "business",
        &["business", "startup", "company", "service"],
        &["entrepreneur", "smallbusiness", "business", "startups", "marketing"],
    ),
    (
        "technology",
        &["tech", "software", "saas", "platform", "app"],
        &["technology", "software", "programming", "webdev", "saas"],
    ),
    (
        "productivity",
        &["productivity", "efficiency", "management", "organization"],
        &["productivity", "getmotivated", "lifehacks", "organization"],
    ),
    (
        "finance",
        &["finance", "fintech", "accounting"],
        &["personalfinance", "investing", "financialplanning", "money"],
    ),
    (
        "ecommerce",
        &["retail", "inventory", "sales", "commerce"],
        &["ecommerce", "shopify", "amazon", "dropshipping", "onlinebusiness"],
    ),
    (
        "health",
        &["health", "fitness", "wellness"],
        &["health", "fitness", "nutrition", "wellness", "mentalhealth"],
    ),
    (
        "education",
        &["education", "learning", "course"],
        &["education", "learnprogramming", "studytips", "university"],
    ),
];

const FALLBACK_GROUPS: &[&str] = &[
    "entrepreneur",
    "smallbusiness",
    "business",
    "startups",
    "marketing",
    "askreddit",
    "nostupidquestions",
    "advice",
    "lifeprotips",
];

static RE_NOT_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("term-clean regex"));
static RE_LONG_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w{4,}\b").expect("long-word regex"));

/// Marketing search terms for a context, highest intent first.
pub fn search_terms(context: &BusinessContext) -> Vec<String> {
    let mut raw: Vec<String> = HIGH_INTENT_TERMS.iter().map(|s| s.to_string()).collect();

    for kw in context.keywords.iter().take(5) {
        raw.push(kw.clone());
        for prefix in PROBLEM_PREFIXES {
            raw.push(format!("{prefix} {kw}"));
        }
    }

    for pain in context.pain_points.iter().take(3) {
        let pain = pain.to_lowercase();
        if pain.split_whitespace().count() <= 4 {
            raw.push(pain);
        } else {
            raw.extend(
                RE_LONG_WORD
                    .find_iter(&pain)
                    .take(3)
                    .map(|m| m.as_str().to_string()),
            );
        }
    }

    raw.extend(SOLUTION_TERMS.iter().map(|s| s.to_string()));
    raw.extend(QUESTION_TERMS.iter().map(|s| s.to_string()));

    let mut out: Vec<String> = Vec::with_capacity(MAX_SEARCH_TERMS);
    for t in raw {
        let t = RE_NOT_TERM.replace_all(&t.to_lowercase(), "").trim().to_string();
        if t.len() > 2 && !out.contains(&t) {
            out.push(t);
        }
        if out.len() == MAX_SEARCH_TERMS {
            break;
        }
    }
    out
}

/// Groups to search: recommended first, then industry defaults, capped at `limit`.
pub fn target_groups(context: &BusinessContext, limit: usize) -> Vec<String> {
    let mut groups: Vec<String> = context
        .recommended_groups
        .iter()
        .map(|g| g.trim().trim_start_matches("r/").to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();

    let industry = context.industry.to_lowercase();
    for (category, hints, defaults) in CATEGORY_GROUPS {
        if industry.contains(category) || hints.iter().any(|h| industry.contains(h)) {
            groups.extend(defaults.iter().map(|s| s.to_string()));
        }
    }

    if groups.is_empty() {
        groups.extend(FALLBACK_GROUPS.iter().map(|s| s.to_string()));
    }

    let mut out: Vec<String> = Vec::with_capacity(limit);
    for g in groups {
        if out.len() == limit {
            break;
        }
        if !out.contains(&g) {
            out.push(g);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BusinessContext {
        BusinessContext {
            product_summary: "TaskPilot".into(),
            industry: "B2B SaaS productivity".into(),
            keywords: vec!["task tracking".into(), "c++ tooling".into()],
            pain_points: vec![
                "missed deadlines".into(),
                "Teams lose track of who owns which follow-up after meetings".into(),
            ],
            recommended_groups: vec!["r/ProjectManagement".into(), "saas".into()],
            key_benefits: vec![],
        }
    }

    #[test]
    fn terms_are_clean_unique_and_capped() {
        let t = search_terms(&ctx());
        assert!(t.len() <= MAX_SEARCH_TERMS);
        assert_eq!(t[0], "best tool for");
        assert!(t.contains(&"task tracking".to_string()));
        assert!(t.contains(&"struggling with task tracking".to_string()));
        assert!(t.contains(&"c tooling".to_string()));
        assert!(t.contains(&"missed deadlines".to_string()));
        assert!(t.contains(&"teams".to_string()));
        let mut dedup = t.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), t.len());
        assert!(t.iter().all(|s| s.len() > 2));
    }

    #[test]
    fn recommended_groups_come_first_then_categories() {
        let g = target_groups(&ctx(), 8);
        assert_eq!(g[0], "projectmanagement");
        assert_eq!(g[1], "saas");
        assert_eq!(g.len(), 8);
        assert!(g.contains(&"technology".to_string()));
        assert_eq!(g.iter().filter(|x| x.as_str() == "saas").count(), 1);
    }

    #[test]
    fn unknown_industry_falls_back_to_general_groups() {
        let g = target_groups(&BusinessContext::default(), 20);
        assert_eq!(g, FALLBACK_GROUPS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }
}
