//! Local controls
//!
//! Thin triggers into session state. They never pass through the event
//! normalizer; `Gesture` is the one exception and injects a raw device event
//! as if the bridge had delivered it.

use std::path::PathBuf;

use lensmirror_core::prelude::*;
use lensmirror_core::RawDeviceEvent;

use crate::apps::notif::Notification;

#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    Connect,
    Start,
    Stop,
    Increment,
    Decrement,
    Reset,
    Sync,
    MoveLeft,
    MoveRight,
    PresetAdd(String),
    /// 1-based position in the preset list
    PresetRemove(usize),
    CommandAdd {
        url: String,
        name: String,
        tags: Vec<String>,
    },
    CommandRemove(u32),
    CommandSelect(u32),
    Filter(String),
    Run,
    AllowAdd(String),
    AllowRemove(String),
    AllowClear,
    Notify(Notification),
    TestNotification,
    Render,
    Layout(PathBuf),
    Gesture(RawDeviceEvent),
    ClearLog,
    Quit,
}

impl LocalAction {
    /// Parse one control line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<LocalAction>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (head, rest) = split_word(line);
        let action = match head {
            "connect" => LocalAction::Connect,
            "start" => LocalAction::Start,
            "stop" => LocalAction::Stop,
            "inc" => LocalAction::Increment,
            "dec" => LocalAction::Decrement,
            "reset" => LocalAction::Reset,
            "sync" => LocalAction::Sync,
            "left" => LocalAction::MoveLeft,
            "right" => LocalAction::MoveRight,
            "run" => LocalAction::Run,
            "test" => LocalAction::TestNotification,
            "render" => LocalAction::Render,
            "clear-log" => LocalAction::ClearLog,
            "quit" | "exit" => LocalAction::Quit,
            "preset" => parse_preset(rest)?,
            "cmd" => parse_command(rest)?,
            "filter" => LocalAction::Filter(required(rest, "filter TAG")?.to_string()),
            "allow" => parse_allow(rest)?,
            "notify" => LocalAction::Notify(parse_notification(rest)?),
            "layout" => LocalAction::Layout(PathBuf::from(required(rest, "layout PATH")?)),
            "gesture" => LocalAction::Gesture(RawDeviceEvent::parse(required(
                rest,
                "gesture JSON",
            )?)?),
            other => {
                return Err(Error::invalid_command(format!("unknown command '{}'", other)));
            }
        };
        Ok(Some(action))
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(Error::invalid_command(format!("usage: {}", usage)))
    } else {
        Ok(rest)
    }
}

fn parse_preset(rest: &str) -> Result<LocalAction> {
    let (verb, arg) = split_word(rest);
    match verb {
        "add" => Ok(LocalAction::PresetAdd(
            required(arg, "preset add MM:SS")?.to_string(),
        )),
        "remove" => required(arg, "preset remove N")?
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(LocalAction::PresetRemove)
            .ok_or_else(|| Error::invalid_command("preset position must be 1 or more")),
        _ => Err(Error::invalid_command("usage: preset add MM:SS | preset remove N")),
    }
}

/// `cmd add URL [NAME...] [#tag,tag]`, `cmd remove ID`, `cmd select ID`
fn parse_command(rest: &str) -> Result<LocalAction> {
    let (verb, arg) = split_word(rest);
    match verb {
        "add" => {
            let (url, tail) = split_word(required(arg, "cmd add URL [NAME] [#TAGS]")?);
            let mut words: Vec<&str> = tail.split_whitespace().collect();
            let tags = match words.last() {
                Some(last) if last.starts_with('#') => {
                    let tags = parse_tags(last.trim_start_matches('#'));
                    words.pop();
                    tags
                }
                _ => Vec::new(),
            };
            Ok(LocalAction::CommandAdd {
                url: url.to_string(),
                name: words.join(" "),
                tags,
            })
        }
        "remove" => Ok(LocalAction::CommandRemove(parse_id(arg)?)),
        "select" => Ok(LocalAction::CommandSelect(parse_id(arg)?)),
        _ => Err(Error::invalid_command(
            "usage: cmd add URL [NAME] [#TAGS] | cmd remove ID | cmd select ID",
        )),
    }
}

fn parse_id(arg: &str) -> Result<u32> {
    arg.parse::<u32>()
        .map_err(|_| Error::invalid_command(format!("invalid command id '{}'", arg)))
}

/// Comma separated, trimmed, lowercased, deduplicated.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split(',') {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn parse_allow(rest: &str) -> Result<LocalAction> {
    let (verb, arg) = split_word(rest);
    match verb {
        "add" => Ok(LocalAction::AllowAdd(
            required(arg, "allow add APP")?.to_string(),
        )),
        "remove" => Ok(LocalAction::AllowRemove(
            required(arg, "allow remove APP")?.to_string(),
        )),
        "clear" => Ok(LocalAction::AllowClear),
        _ => Err(Error::invalid_command(
            "usage: allow add APP | allow remove APP | allow clear",
        )),
    }
}

/// `APP|TITLE|TEXT`; missing trailing parts are empty.
fn parse_notification(rest: &str) -> Result<Notification> {
    let rest = required(rest, "notify APP|TITLE|TEXT")?;
    let mut parts = rest.splitn(3, '|').map(str::trim);
    Ok(Notification {
        app: parts.next().unwrap_or_default().to_string(),
        title: parts.next().unwrap_or_default().to_string(),
        text: parts.next().unwrap_or_default().to_string(),
        kind: None,
    })
}
