//! Saved REST commands and the tag filter cycle

use serde::{Deserialize, Serialize};

use crate::action::parse_tags;

/// Filter value meaning "every command".
pub const TAG_ALL: &str = "__all__";

/// Longest label shown in the device list.
const GLASS_LABEL_MAX: usize = 62;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestCommand {
    pub id: u32,
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RestCommand {
    /// Name, or the URL when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    /// `name [tag, tag] -> url`
    pub fn local_label(&self) -> String {
        if self.tags.is_empty() {
            format!("{} -> {}", self.display_name(), self.url)
        } else {
            format!("{} [{}] -> {}", self.display_name(), self.tags.join(", "), self.url)
        }
    }

    /// Device list label: name plus first tag, cut to 62 chars.
    pub fn glass_label(&self) -> String {
        let text = match self.tags.first() {
            Some(tag) => format!("{} #{}", self.display_name(), tag),
            None => self.display_name().to_string(),
        };
        if text.chars().count() <= GLASS_LABEL_MAX {
            return text;
        }
        let cut: String = text.chars().take(GLASS_LABEL_MAX - 3).collect();
        format!("{}...", cut)
    }
}

pub fn tag_filter_label(filter: &str) -> String {
    if filter == TAG_ALL {
        "all tags".to_string()
    } else {
        format!("#{}", filter)
    }
}

fn merge_tags(existing: &[String], extra: &[String]) -> Vec<String> {
    parse_tags(
        &existing
            .iter()
            .chain(extra)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Outcome of [`CommandStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub command: RestCommand,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStore {
    commands: Vec<RestCommand>,
    next_id: u32,
}

impl Default for CommandStore {
    fn default() -> Self {
        let mut store = Self {
            commands: Vec::new(),
            next_id: 1,
        };
        store.upsert(
            "http://livingkitchen.local/rest/system/clock",
            "Clock",
            &["system".to_string(), "livingroom".to_string()],
        );
        store.upsert(
            "http://livingkitchen.local/rest/rgb/toggle",
            "RGB Toggle",
            &["lights".to_string(), "livingroom".to_string()],
        );
        store
    }
}

impl CommandStore {
    /// Restore saved commands; ids continue after the highest one seen.
    pub fn from_saved(commands: Vec<RestCommand>) -> Self {
        let next_id = commands.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self { commands, next_id }
    }

    pub fn list(&self) -> &[RestCommand] {
        &self.commands
    }

    pub fn find(&self, id: u32) -> Option<&RestCommand> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn filtered(&self, filter: &str) -> Vec<&RestCommand> {
        self.commands
            .iter()
            .filter(|c| filter == TAG_ALL || c.tags.iter().any(|t| t == filter))
            .collect()
    }

    /// Every tag in use, sorted.
    pub fn available_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .commands
            .iter()
            .flat_map(|c| c.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// `all -> tag1 -> ... -> tagN -> all`. Unknown filters restart at `all`.
    pub fn next_tag_filter(&self, current: &str) -> String {
        let mut cycle = vec![TAG_ALL.to_string()];
        cycle.extend(self.available_tags());
        match cycle.iter().position(|f| f == current) {
            Some(i) => cycle[(i + 1) % cycle.len()].clone(),
            None => TAG_ALL.to_string(),
        }
    }

    /// Add a command, or merge into the one with the same URL.
    ///
    /// Merging keeps the old name when the new one is blank and unions tags.
    pub fn upsert(&mut self, url: &str, name: &str, tags: &[String]) -> Upserted {
        let url = url.trim();
        let name = name.trim();

        if let Some(existing) = self.commands.iter_mut().find(|c| c.url == url) {
            if !name.is_empty() {
                existing.name = name.to_string();
            }
            existing.tags = merge_tags(&existing.tags, tags);
            return Upserted {
                command: existing.clone(),
                created: false,
            };
        }

        let command = RestCommand {
            id: self.next_id,
            url: url.to_string(),
            name: name.to_string(),
            tags: merge_tags(&[], tags),
        };
        self.next_id += 1;
        self.commands.push(command.clone());
        Upserted {
            command,
            created: true,
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<RestCommand> {
        let index = self.commands.iter().position(|c| c.id == id)?;
        Some(self.commands.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let store = CommandStore::default();
        assert_eq!(store.list().len(), 2);
        assert_eq!(store.list()[0].id, 1);
        assert_eq!(store.list()[1].name, "RGB Toggle");
        assert_eq!(
            store.available_tags(),
            tags(&["lights", "livingroom", "system"])
        );
    }

    #[test]
    fn test_upsert_merges_by_trimmed_url() {
        let mut store = CommandStore::default();
        let result = store.upsert(
            " http://livingkitchen.local/rest/rgb/toggle ",
            "",
            &tags(&["Kitchen", "lights"]),
        );
        assert!(!result.created);
        assert_eq!(result.command.name, "RGB Toggle");
        assert_eq!(result.command.tags, tags(&["lights", "livingroom", "kitchen"]));
        assert_eq!(store.list().len(), 2);

        let result = store.upsert("http://example.test/ping", "  ", &[]);
        assert!(result.created);
        assert_eq!(result.command.id, 3);
        assert_eq!(result.command.display_name(), "http://example.test/ping");
    }

    #[test]
    fn test_remove_and_ids_continue() {
        let mut store = CommandStore::default();
        assert_eq!(store.remove(1).map(|c| c.name), Some("Clock".to_string()));
        assert_eq!(store.remove(1), None);

        let mut restored = CommandStore::from_saved(store.list().to_vec());
        assert_eq!(restored.upsert("http://x.test", "X", &[]).command.id, 3);
    }

    #[test]
    fn test_tag_filter_cycle() {
        let store = CommandStore::default();
        let mut filter = TAG_ALL.to_string();
        let mut seen = Vec::new();
        for _ in 0..4 {
            filter = store.next_tag_filter(&filter);
            seen.push(tag_filter_label(&filter));
        }
        assert_eq!(seen, vec!["#lights", "#livingroom", "#system", "all tags"]);
        assert_eq!(store.next_tag_filter("gone"), TAG_ALL);
        assert_eq!(store.filtered("lights").len(), 1);
        assert_eq!(store.filtered(TAG_ALL).len(), 2);
    }

    #[test]
    fn test_glass_label_truncation() {
        let mut command = RestCommand {
            id: 1,
            url: "http://x".into(),
            name: "Clock".into(),
            tags: tags(&["system", "livingroom"]),
        };
        assert_eq!(command.glass_label(), "Clock #system");

        command.name = "n".repeat(70);
        let label = command.glass_label();
        assert_eq!(label.chars().count(), 62);
        assert!(label.ends_with("..."));
    }

    #[test]
    fn test_local_label() {
        let store = CommandStore::default();
        assert_eq!(
            store.list()[0].local_label(),
            "Clock [system, livingroom] -> http://livingkitchen.local/rest/system/clock"
        );
    }
}
