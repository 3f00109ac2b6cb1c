//! Built-in rule blueprints. Names line up with the recommendation table so a
//! recommended candidate finds its blueprint; anything else is synthesized.

use crate::RuleType;

pub struct BlueprintExample {
    pub valid: bool,
    pub body: &'static str,
}

pub struct Blueprint {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub globs: &'static [&'static str],
    pub rule_type: RuleType,
    pub context: &'static str,
    pub critical_rules: &'static [&'static str],
    pub examples: &'static [BlueprintExample],
}

pub const BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        name: "python-best-practices",
        title: "Python Best Practices",
        description: "Idiomatic, typed Python for application and library code",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "Applies to all Python modules in the repository. Code is read far more often \
than it is written, so prefer explicit types and small functions.",
        critical_rules: &[
            "Add type hints to every public function signature",
            "Use pathlib.Path instead of os.path string manipulation",
            "Never use a bare `except:`; catch the narrowest exception type",
            "Keep module-level side effects out of import time",
            "Format with the project's configured formatter before committing",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "from pathlib import Path\n\ndef read_config(path: Path) -> dict[str, str]:\n    return parse(path.read_text())",
            },
            BlueprintExample {
                valid: false,
                body: "import os\n\ndef read_config(path):\n    try:\n        return parse(open(os.path.join(path)).read())\n    except:\n        return {}",
            },
        ],
    },
    Blueprint {
        name: "fastapi-conventions",
        title: "FastAPI Conventions",
        description: "Router, dependency and schema conventions for FastAPI services",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "The service exposes HTTP endpoints through FastAPI with Pydantic models for \
request and response bodies.",
        critical_rules: &[
            "Declare a Pydantic response_model on every endpoint",
            "Group endpoints with APIRouter per resource, never on the app object directly",
            "Inject sessions, settings and clients with Depends instead of module globals",
            "Use async def only when the body awaits; blocking I/O goes in def endpoints",
            "Raise HTTPException with an explicit status code for client errors",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "router = APIRouter(prefix=\"/items\")\n\n@router.get(\"/{item_id}\", response_model=ItemOut)\nasync def get_item(item_id: int, repo: ItemRepo = Depends(get_repo)) -> ItemOut:\n    return await repo.get(item_id)",
            },
            BlueprintExample {
                valid: false,
                body: "@app.get(\"/items/{item_id}\")\ndef get_item(item_id):\n    return db.query(item_id).__dict__",
            },
        ],
    },
    Blueprint {
        name: "django-conventions",
        title: "Django Conventions",
        description: "Model, view and migration conventions for Django projects",
        globs: &["**/*.py"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "The project is a Django application; apps own their models, views, and migrations.",
        critical_rules: &[
            "Never edit an applied migration; create a new one",
            "Keep business logic out of views; put it in services or model methods",
            "Use select_related/prefetch_related for relations accessed in loops",
            "Read settings through django.conf.settings, never by importing the settings module",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "orders = Order.objects.select_related(\"customer\").filter(status=\"open\")",
            },
            BlueprintExample {
                valid: false,
                body: "for order in Order.objects.all():\n    print(order.customer.name)",
            },
        ],
    },
    Blueprint {
        name: "typescript-best-practices",
        title: "TypeScript Best Practices",
        description: "Strictly typed TypeScript without escape hatches",
        globs: &["**/*.ts", "**/*.tsx"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "The codebase compiles with strict mode enabled.",
        critical_rules: &[
            "Do not use `any`; use `unknown` and narrow",
            "Prefer discriminated unions over optional flag fields",
            "Export types alongside the functions that produce them",
            "Never silence the compiler with `@ts-ignore`",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "type Result = { ok: true; value: User } | { ok: false; error: string };",
            },
            BlueprintExample {
                valid: false,
                body: "function load(data: any) {\n  // @ts-ignore\n  return data.user.name;\n}",
            },
        ],
    },
    Blueprint {
        name: "react-components",
        title: "React Components",
        description: "Function component and hook conventions for React code",
        globs: &["**/*.tsx", "**/*.jsx"],
        rule_type: RuleType::AutoSelect,
        context: "UI is built from React function components.",
        critical_rules: &[
            "Write function components with hooks; no class components",
            "Keep components presentational; fetch data in hooks or containers",
            "Give every list item a stable key that is not the array index",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "{users.map((u) => <UserRow key={u.id} user={u} />)}",
            },
            BlueprintExample {
                valid: false,
                body: "{users.map((u, i) => <UserRow key={i} user={u} />)}",
            },
        ],
    },
    Blueprint {
        name: "rust-best-practices",
        title: "Rust Best Practices",
        description: "Error handling and ownership conventions for Rust crates",
        globs: &["**/*.rs"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "All crates in the workspace share one error-handling and logging style.",
        critical_rules: &[
            "Propagate errors with `?`; no `unwrap()` outside tests",
            "Use thiserror for library error enums and anyhow only in binaries",
            "Log with tracing macros, never println! in library code",
            "Prefer borrowing (&str, &[T]) in function parameters",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "fn load(path: &Path) -> Result<Config, ConfigError> {\n    let raw = fs::read_to_string(path)?;\n    Ok(toml::from_str(&raw)?)\n}",
            },
            BlueprintExample {
                valid: false,
                body: "fn load(path: String) -> Config {\n    toml::from_str(&fs::read_to_string(path).unwrap()).unwrap()\n}",
            },
        ],
    },
    Blueprint {
        name: "go-best-practices",
        title: "Go Best Practices",
        description: "Error wrapping and package layout for Go code",
        globs: &["**/*.go"],
        rule_type: RuleType::AutoSelectWithDescription,
        context: "Go packages follow the standard project layout.",
        critical_rules: &[
            "Wrap errors with fmt.Errorf and %w to keep the chain",
            "Accept interfaces, return concrete types",
            "Pass context.Context as the first parameter of blocking calls",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "if err != nil {\n    return fmt.Errorf(\"load config: %w\", err)\n}",
            },
            BlueprintExample {
                valid: false,
                body: "if err != nil {\n    panic(err)\n}",
            },
        ],
    },
    Blueprint {
        name: "pytest-testing",
        title: "Pytest Testing",
        description: "How tests are written and organised with pytest",
        globs: &["tests/**/*.py", "**/test_*.py"],
        rule_type: RuleType::AutoSelect,
        context: "Tests live under tests/ and run with pytest.",
        critical_rules: &[
            "Use plain assert statements, not unittest assertion methods",
            "Share setup through fixtures in conftest.py",
            "Use tmp_path for filesystem tests; never write into the repository",
            "Parametrize instead of copy-pasting near-identical tests",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "@pytest.mark.parametrize(\"raw,expected\", [(\"a\", 1), (\"b\", 2)])\ndef test_parse(raw: str, expected: int) -> None:\n    assert parse(raw) == expected",
            },
            BlueprintExample {
                valid: false,
                body: "class TestParse(unittest.TestCase):\n    def test_a(self):\n        self.assertEqual(parse(\"a\"), 1)",
            },
        ],
    },
    Blueprint {
        name: "jest-testing",
        title: "JavaScript Testing",
        description: "Unit test conventions for Jest and Vitest suites",
        globs: &["**/*.test.ts", "**/*.test.tsx"],
        rule_type: RuleType::AutoSelect,
        context: "Unit tests sit next to the code they cover.",
        critical_rules: &[
            "One behaviour per test, named after that behaviour",
            "Query the DOM by role or label, not by class name",
            "Reset mocks between tests",
        ],
        examples: &[],
    },
    Blueprint {
        name: "docker-conventions",
        title: "Docker Conventions",
        description: "Container image build conventions",
        globs: &["**/Dockerfile", "**/docker-compose*.yml"],
        rule_type: RuleType::AutoSelect,
        context: "Services ship as container images.",
        critical_rules: &[
            "Pin base images to a specific tag, never `latest`",
            "Use multi-stage builds so build tooling stays out of the runtime image",
            "Run the final stage as a non-root user",
        ],
        examples: &[BlueprintExample {
            valid: false,
            body: "FROM python:latest\nRUN pip install -r requirements.txt",
        }],
    },
    Blueprint {
        name: "makefile-tasks",
        title: "Makefile Tasks",
        description: "Conventions for build automation targets",
        globs: &["Makefile", "**/*.mk"],
        rule_type: RuleType::AutoSelect,
        context: "Developer workflows are driven through make targets.",
        critical_rules: &[
            "Declare every non-file target in .PHONY",
            "Indent recipes with tabs",
            "Keep targets idempotent so they can be re-run safely",
        ],
        examples: &[],
    },
    Blueprint {
        name: "github-actions",
        title: "GitHub Actions",
        description: "CI workflow conventions",
        globs: &[".github/workflows/*.yml"],
        rule_type: RuleType::AutoSelect,
        context: "CI runs on GitHub Actions.",
        critical_rules: &[
            "Pin third-party actions to a version tag or commit SHA",
            "Grant the workflow token the minimum permissions it needs",
            "Cache dependency downloads keyed on the lockfile hash",
        ],
        examples: &[],
    },
    Blueprint {
        name: "git-commit-standards",
        title: "Git Commit Standards",
        description: "How commits and commit messages are written",
        globs: &["**/*"],
        rule_type: RuleType::AlwaysApplied,
        context: "Every change lands through reviewed commits.",
        critical_rules: &[
            "Use conventional commit prefixes (feat, fix, docs, refactor, test, chore)",
            "Keep the subject line under 72 characters, imperative mood",
            "One logical change per commit",
        ],
        examples: &[
            BlueprintExample {
                valid: true,
                body: "fix(parser): handle empty frontmatter blocks",
            },
            BlueprintExample {
                valid: false,
                body: "fixed stuff",
            },
        ],
    },
    Blueprint {
        name: "code-documentation",
        title: "Code Documentation",
        description: "When and how to document code and keep the README current",
        globs: &["**/*"],
        rule_type: RuleType::AgentSelected,
        context: "Documentation lives next to the code and in the README.",
        critical_rules: &[
            "Document every public function, class and module",
            "Update the README when behaviour visible to users changes",
            "Explain why in comments; the code already says what",
        ],
        examples: &[],
    },
];

pub fn find(name: &str) -> Option<&'static Blueprint> {
    BLUEPRINTS.iter().find(|b| b.name == name)
}

pub fn names() -> Vec<&'static str> {
    BLUEPRINTS.iter().map(|b| b.name).collect()
}
