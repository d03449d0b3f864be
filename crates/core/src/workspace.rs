//! Workspace context: system prompt and installed skills.
//!
//! The workspace is a directory of markdown files the agent reads on every
//! turn (so edits take effect without a restart):
//!
//! 1. `SOUL.md`: personality, tone, style
//! 2. `AGENTS.md`: operating instructions
//! 3. `USER.md`: facts about the owner
//! 4. `memory/MEMORY.md`: long-term memory, under a `## Long-term Memory` heading
//! 5. `skills/<name>/SKILL.md`: installed skills, listed by frontmatter
//!
//! Each file is optional. Missing or blank files are skipped, and sections
//! are joined with a horizontal rule.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SOUL_FILE: &str = "SOUL.md";
pub const AGENTS_FILE: &str = "AGENTS.md";
pub const USER_FILE: &str = "USER.md";
pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";
pub const MEMORY_FILE: &str = "memory/MEMORY.md";
pub const SKILLS_DIR: &str = "skills";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// An installed skill, parsed from `SKILL.md` frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
}

/// Read-only view of the agent's workspace.
pub trait WorkspaceContext: Send + Sync {
    /// Directory tools are confined to.
    fn root(&self) -> &Path;

    /// The system-prompt text for the next model call.
    ///
    /// May block on file IO; async callers run it on the blocking pool.
    fn system_prompt(&self) -> String;

    /// Currently installed skills.
    fn skills(&self) -> Vec<Skill>;
}

/// A workspace backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FileWorkspace {
    root: PathBuf,
}

impl FileWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the heartbeat task list.
    pub fn heartbeat_path(&self) -> PathBuf {
        self.root.join(HEARTBEAT_FILE)
    }

    /// The fallback system prompt when no context files exist.
    fn fallback_system_prompt() -> String {
        concat!(
            "You are Cinder, a helpful personal assistant. ",
            "You have tools that let you read and write files in your workspace, ",
            "run commands, and schedule jobs. Use them when they help. ",
            "Be concise and accurate.",
        )
        .into()
    }

    /// Create the workspace layout and write default files that are absent.
    /// Existing files are never overwritten.
    pub fn ensure_defaults(&self) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(self.root.join("memory"))?;
        std::fs::create_dir_all(self.root.join(SKILLS_DIR))?;

        let defaults: [(&str, &str); 5] = [
            (SOUL_FILE, DEFAULT_SOUL),
            (AGENTS_FILE, DEFAULT_AGENTS),
            (USER_FILE, DEFAULT_USER),
            (HEARTBEAT_FILE, DEFAULT_HEARTBEAT),
            (MEMORY_FILE, DEFAULT_MEMORY),
        ];

        let mut created = Vec::new();
        for (rel, content) in defaults {
            let path = self.root.join(rel);
            if !path.exists() {
                std::fs::write(&path, content)?;
                debug!(file = %path.display(), "Wrote default workspace file");
                created.push(path);
            }
        }
        Ok(created)
    }

    fn read_section(&self, rel: &str) -> Option<String> {
        let path = self.root.join(rel);
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => Some(content.trim().to_string()),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read context file");
                None
            }
        }
    }
}

impl WorkspaceContext for FileWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn system_prompt(&self) -> String {
        let mut sections: Vec<String> = [SOUL_FILE, AGENTS_FILE, USER_FILE]
            .iter()
            .filter_map(|f| self.read_section(f))
            .collect();

        if let Some(memory) = self.read_section(MEMORY_FILE) {
            sections.push(format!("## Long-term Memory\n{memory}"));
        }

        let skills = self.skills();
        if !skills.is_empty() {
            let mut listing = String::from("## Skills\n");
            for skill in &skills {
                listing.push_str(&format!(
                    "- {}: {} ({})\n",
                    skill.name,
                    skill.description,
                    skill.path.display()
                ));
            }
            sections.push(listing.trim_end().to_string());
        }

        if sections.is_empty() {
            debug!("No context files found, using fallback system prompt");
            return Self::fallback_system_prompt();
        }
        sections.join(SECTION_SEPARATOR)
    }

    fn skills(&self) -> Vec<Skill> {
        let dir = self.root.join(SKILLS_DIR);
        let entries = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(_) => return Vec::new(),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path().join("SKILL.md"))
            .filter(|p| p.is_file())
            .collect();
        // Sort for deterministic ordering
        paths.sort();

        paths
            .into_iter()
            .filter_map(|path| {
                let content = std::fs::read_to_string(&path).ok()?;
                let fallback = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .unwrap_or("skill")
                    .to_string();
                let (name, description) = parse_frontmatter(&content);
                Some(Skill {
                    name: name.unwrap_or(fallback),
                    description: description.unwrap_or_default(),
                    path,
                })
            })
            .collect()
    }
}

/// Extract `name` and `description` from a `---` delimited header.
fn parse_frontmatter(content: &str) -> (Option<String>, Option<String>) {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some("---") {
        return (None, None);
    }

    let mut name = None;
    let mut description = None;
    for line in lines {
        let line = line.trim();
        if line == "---" {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            match key.trim() {
                "name" => name = Some(value),
                "description" => description = Some(value),
                _ => {}
            }
        }
    }
    (name, description)
}

const DEFAULT_SOUL: &str = "# Soul\n\nYou are Cinder, a calm and practical assistant. Keep replies short.\n";

const DEFAULT_AGENTS: &str = "# Agents\n\n\
- Keep notes in `memory/MEMORY.md` when you learn something worth remembering.\n\
- Use `add_cron_job` for reminders instead of promising to remember.\n";

const DEFAULT_USER: &str = "# User\n\n<!-- Facts about the owner go here. -->\n";

const DEFAULT_HEARTBEAT: &str = "# Heartbeat Tasks\n\n\
<!-- Add one task per line. Leave only headings and comments to skip heartbeat runs. -->\n\
- [ ]\n";

const DEFAULT_MEMORY: &str = "# Memory\n";
