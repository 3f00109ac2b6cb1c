//! Keyword-table scoring of rule candidates against a free-text repository summary.

use std::collections::{HashMap, HashSet};

use crate::{Category, RuleCandidate, RuleType};

/// One row of the scoring table: trigger keywords and the candidate they propose.
pub struct TableEntry {
    pub name: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub globs: &'static [&'static str],
    pub rule_type: RuleType,
    pub keywords: &'static [&'static str],
}

/// Declaration order is the tie-break order.
pub const RECOMMENDATION_TABLE: &[TableEntry] = &[
    TableEntry {
        name: "python-best-practices",
        category: Category::Language,
        description: "Idiomatic, typed Python for application and library code",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &[
            "python", "py", "pip", "poetry", "uv", "pydantic", "fastapi", "django", "flask",
            "pytest",
        ],
    },
    TableEntry {
        name: "typescript-best-practices",
        category: Category::Language,
        description: "Strictly typed TypeScript without escape hatches",
        globs: &["**/*.ts", "**/*.tsx"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &["typescript", "ts", "tsx", "react", "nextjs", "next.js", "node", "deno", "jest"],
    },
    TableEntry {
        name: "rust-best-practices",
        category: Category::Language,
        description: "Error handling and ownership conventions for Rust crates",
        globs: &["**/*.rs"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &["rust", "cargo", "crate", "tokio", "axum"],
    },
    TableEntry {
        name: "go-best-practices",
        category: Category::Language,
        description: "Error wrapping and package layout for Go code",
        globs: &["**/*.go"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &["go", "golang"],
    },
    TableEntry {
        name: "fastapi-conventions",
        category: Category::Framework,
        description: "Router, dependency and schema conventions for FastAPI services",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &["fastapi", "starlette", "pydantic", "uvicorn"],
    },
    TableEntry {
        name: "django-conventions",
        category: Category::Framework,
        description: "Model, view and migration conventions for Django projects",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        keywords: &["django", "drf", "django rest framework"],
    },
    TableEntry {
        name: "react-components",
        category: Category::Framework,
        description: "Function component and hook conventions for React code",
        globs: &["**/*.tsx", "**/*.jsx"],
        rule_type: RuleType::AutoSelect,
        keywords: &["react", "jsx", "tsx", "nextjs", "next.js"],
    },
    TableEntry {
        name: "pytest-testing",
        category: Category::Testing,
        description: "How tests are written and organised with pytest",
        globs: &["tests/**/*.py", "**/test_*.py"],
        rule_type: RuleType::AutoSelect,
        keywords: &["pytest", "unittest", "coverage", "tdd"],
    },
    TableEntry {
        name: "jest-testing",
        category: Category::Testing,
        description: "Unit test conventions for Jest and Vitest suites",
        globs: &["**/*.test.ts", "**/*.test.tsx"],
        rule_type: RuleType::AutoSelect,
        keywords: &["jest", "vitest", "testing-library"],
    },
    TableEntry {
        name: "docker-conventions",
        category: Category::Tooling,
        description: "Container image build conventions",
        globs: &["**/Dockerfile", "**/docker-compose*.yml"],
        rule_type: RuleType::AutoSelect,
        keywords: &["docker", "dockerfile", "container", "containers", "compose", "kubernetes"],
    },
    TableEntry {
        name: "makefile-tasks",
        category: Category::Tooling,
        description: "Conventions for build automation targets",
        globs: &["Makefile", "**/*.mk"],
        rule_type: RuleType::AutoSelect,
        keywords: &["make", "makefile"],
    },
    TableEntry {
        name: "github-actions",
        category: Category::Tooling,
        description: "CI workflow conventions",
        globs: &[".github/workflows/*.yml"],
        rule_type: RuleType::AutoSelect,
        keywords: &["ci", "github actions", "github-actions", "pipeline"],
    },
    TableEntry {
        name: "git-commit-standards",
        category: Category::Workflow,
        description: "How commits and commit messages are written",
        globs: &["**/*"],
        rule_type: RuleType::AlwaysApplied,
        keywords: &["git", "commit", "commits", "conventional commits"],
    },
    TableEntry {
        name: "code-documentation",
        category: Category::Workflow,
        description: "When and how to document code and keep the README current",
        globs: &["**/*"],
        rule_type: RuleType::AgentSelected,
        keywords: &["project", "documentation", "docs", "readme", "docstring", "docstrings"],
    },
];

/// Lower-cased words of `text`. `.`, `+` and `#` stay inside words so `next.js`
/// and `c++` survive; sentence punctuation at the edges is dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '.' | '+' | '#')))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

struct Summary {
    tokens: HashSet<String>,
    /// Tokens joined by single spaces, padded so phrase search can anchor on spaces.
    normalized: String,
}

impl Summary {
    fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let normalized = format!(" {} ", tokens.join(" "));
        Self {
            tokens: tokens.into_iter().collect(),
            normalized,
        }
    }

    /// Single-word keywords match a whole token; hyphenated or spaced keywords
    /// match as a phrase.
    fn matches(&self, keyword: &str) -> bool {
        let words = tokenize(keyword);
        match words.len() {
            0 => false,
            1 => self.tokens.contains(&words[0]),
            _ => self.normalized.contains(&format!(" {} ", words.join(" "))),
        }
    }
}

fn is_catch_all(glob: &str) -> bool {
    matches!(glob.trim(), "" | "*" | "**" | "**/*" | "**/*.*")
}

/// Specificity of a single glob. A catch-all weighs 1; anything narrower starts
/// at 2 and gains a point for a literal file part and one for a literal directory.
pub fn glob_weight(glob: &str) -> u32 {
    let glob = glob.trim();
    if is_catch_all(glob) {
        return 1;
    }
    let (dirs, file) = match glob.rsplit_once('/') {
        Some((d, f)) => (d, f),
        None => ("", glob),
    };
    let mut weight = 2;
    if file != "*" && file != "**" && file.chars().any(|c| c.is_alphanumeric()) {
        weight += 1;
    }
    if dirs
        .split('/')
        .any(|seg| !seg.is_empty() && !seg.contains('*') && !seg.contains('?'))
    {
        weight += 1;
    }
    weight
}

/// The narrowest glob decides; no globs counts as a catch-all.
pub fn specificity(globs: &[&str]) -> u32 {
    globs.iter().map(|g| glob_weight(g)).max().unwrap_or(1)
}

/// Score every table entry against `summary` and return the matches,
/// deduplicated by name and ordered by descending score.
pub fn recommend(summary: &str) -> Vec<RuleCandidate> {
    recommend_from(RECOMMENDATION_TABLE, summary)
}

pub fn recommend_from(table: &[TableEntry], summary: &str) -> Vec<RuleCandidate> {
    let summary = Summary::new(summary);

    let mut scored: Vec<RuleCandidate> = table
        .iter()
        .filter_map(|entry| {
            let matched: Vec<String> = entry
                .keywords
                .iter()
                .filter(|k| summary.matches(k))
                .map(|k| k.to_string())
                .collect();
            if matched.is_empty() {
                return None;
            }
            let priority = matched.len() as u32 * specificity(entry.globs);
            Some(RuleCandidate {
                name: entry.name.to_string(),
                category: entry.category,
                description: entry.description.to_string(),
                globs: entry.globs.iter().map(|g| g.to_string()).collect(),
                rule_type: entry.rule_type,
                priority,
                dependencies: Vec::new(),
                matched_keywords: matched,
            })
        })
        .collect();

    // Vec::sort_by is stable, so equal scores keep table order.
    scored.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut seen = HashSet::new();
    scored.retain(|c| seen.insert(c.name.clone()));
    scored
}

/// Record soft dependencies between candidates: A is presumed by B when every
/// keyword that triggered B also triggers A, and A has strictly more triggers.
/// The strict size check keeps the relation acyclic.
pub fn infer_dependencies(candidates: &mut [RuleCandidate]) {
    infer_dependencies_from(RECOMMENDATION_TABLE, candidates)
}

pub fn infer_dependencies_from(table: &[TableEntry], candidates: &mut [RuleCandidate]) {
    let triggers: HashMap<&str, HashSet<&str>> = table
        .iter()
        .map(|e| (e.name, e.keywords.iter().copied().collect()))
        .collect();

    let mut found: Vec<Vec<String>> = vec![Vec::new(); candidates.len()];
    for (bi, b) in candidates.iter().enumerate() {
        if b.matched_keywords.is_empty() {
            continue;
        }
        let b_triggers = triggers.get(b.name.as_str()).map(|t| t.len()).unwrap_or(0);
        for a in candidates.iter() {
            if a.name == b.name {
                continue;
            }
            let Some(a_triggers) = triggers.get(a.name.as_str()) else {
                continue;
            };
            if a_triggers.len() > b_triggers
                && b.matched_keywords
                    .iter()
                    .all(|k| a_triggers.contains(k.as_str()))
            {
                found[bi].push(a.name.clone());
            }
        }
    }

    for (candidate, deps) in candidates.iter_mut().zip(found) {
        for dep in deps {
            if !candidate.dependencies.contains(&dep) {
                candidate.dependencies.push(dep);
            }
        }
    }
}
