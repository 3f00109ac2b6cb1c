//! `rulesmith-mcp init`: project-scoped client config so Claude Code and/or
//! Codex start this server for the repository at `RULESMITH_ROOT` (or the
//! current directory). The root is written into the entry, so the client's
//! own working directory does not matter.

use std::ffi::OsStr;
use std::path::Path;

const SERVER_KEY: &str = "rulesmith";

const ROOT_ENV: &str = "RULESMITH_ROOT";

/// Only writes config for clients that are actually installed.
pub fn init_project(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    init_with_path(root, std::env::var_os("PATH").as_deref())
}

fn init_with_path(root: &Path, search_path: Option<&OsStr>) -> Result<(), Box<dyn std::error::Error>> {
    let has_claude = which(search_path, "claude");
    let has_codex = which(search_path, "codex");
    if !has_claude && !has_codex {
        return Err("neither `claude` nor `codex` found in PATH; install Claude Code or \
            OpenAI Codex first, then re-run `rulesmith-mcp init`"
            .into());
    }

    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();
    let root = root.canonicalize()?;
    let root_str = root.to_string_lossy().to_string();

    let mut clients = Vec::new();
    if has_claude {
        write_claude_config(&root, &binary_path, &root_str)?;
        clients.push("Claude Code");
    }
    if has_codex {
        write_codex_config(&root, &binary_path, &root_str)?;
        clients.push("Codex");
    }
    eprintln!("\nDone. {} will use rulesmith in {}.", clients.join(" and "), root_str);
    Ok(())
}

fn which(search_path: Option<&OsStr>, name: &str) -> bool {
    search_path
        .map(|paths| {
            std::env::split_paths(paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

/// Merge our server entry into `.mcp.json`, keeping every other server.
pub fn write_claude_config(
    dir: &Path,
    binary_path: &str,
    repo_root: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = dir.join(".mcp.json");
    let mut root: serde_json::Value = if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };
    if !root.is_object() {
        root = serde_json::json!({});
    }

    if !root.get("mcpServers").is_some_and(|v| v.is_object()) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_KEY] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
        "env": { ROOT_ENV: repo_root },
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

/// Merge our server table into `.codex/config.toml`, preserving formatting
/// of the rest of the file.
pub fn write_codex_config(
    dir: &Path,
    binary_path: &str,
    repo_root: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let codex_dir = dir.join(".codex");
    let path = codex_dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = if path.exists() {
        std::fs::read_to_string(&path)?.parse().unwrap_or_default()
    } else {
        toml_edit::DocumentMut::new()
    };

    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    let mut env = toml_edit::InlineTable::new();
    env.insert(ROOT_ENV, repo_root.into());
    server.insert("env", toml_edit::value(env));
    doc["mcp_servers"][SERVER_KEY] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&codex_dir)?;
    std::fs::write(&path, doc.to_string())?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_without_clients_fails_and_writes_nothing() {
        let repo = tempfile::tempdir().unwrap();
        let empty_bin = tempfile::tempdir().unwrap();

        let err = init_with_path(repo.path(), Some(empty_bin.path().as_os_str())).unwrap_err();
        assert!(err.to_string().starts_with("neither `claude` nor `codex` found"));
        assert!(!repo.path().join(".mcp.json").exists());
        assert!(!repo.path().join(".codex").exists());
    }

    #[test]
    fn claude_config_keeps_other_servers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".mcp.json"),
            r#"{"mcpServers": {"other": {"command": "other-bin"}}}"#,
        )
        .unwrap();

        write_claude_config(dir.path(), "/usr/local/bin/rulesmith-mcp", "/srv/inventory").unwrap();
        let raw = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["mcpServers"]["other"]["command"], "other-bin");
        assert_eq!(v["mcpServers"]["rulesmith"]["command"], "/usr/local/bin/rulesmith-mcp");
        assert_eq!(v["mcpServers"]["rulesmith"]["type"], "stdio");
        assert_eq!(v["mcpServers"]["rulesmith"]["env"]["RULESMITH_ROOT"], "/srv/inventory");
    }

    #[test]
    fn codex_config_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".codex")).unwrap();
        std::fs::write(
            dir.path().join(".codex/config.toml"),
            "model = \"o4\"\n\n[mcp_servers.other]\ncommand = \"other-bin\"\n",
        )
        .unwrap();

        write_codex_config(dir.path(), "/opt/rulesmith-mcp", "/srv/inventory").unwrap();
        let raw = std::fs::read_to_string(dir.path().join(".codex/config.toml")).unwrap();
        let doc: toml_edit::DocumentMut = raw.parse().unwrap();
        assert_eq!(doc["model"].as_str(), Some("o4"));
        assert_eq!(doc["mcp_servers"]["other"]["command"].as_str(), Some("other-bin"));
        assert_eq!(doc["mcp_servers"]["rulesmith"]["command"].as_str(), Some("/opt/rulesmith-mcp"));
        assert_eq!(
            doc["mcp_servers"]["rulesmith"]["env"]["RULESMITH_ROOT"].as_str(),
            Some("/srv/inventory")
        );
    }
}
