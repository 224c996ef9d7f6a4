//! Text commands
//!
//! Commands are written as `name(arg, arg)` or a bare `name`, optionally
//! with a sub-command: `select_track:toggle(0)`. Unknown names are
//! [`SfError::NotImplemented`], malformed input is
//! [`SfError::InvalidCommand`].

use std::fmt;
use std::str::FromStr;

use sf_core::{SfError, SfResult};

use crate::{SignalManager, TrackSelect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    Crop,
    Delete,
    AddTrack,
    InsertTrack(usize),
    DeleteTrack(usize),
    SelectAll,
    SelectNone,
    SelectRange { offset: u64, length: u64 },
    SelectTrack(usize, TrackSelect),
    SelectAllTracks,
    InvertTrackSelection,
    InsertSilence(u64),
    ClearClipboard,
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::Undo => "undo",
            EditCommand::Redo => "redo",
            EditCommand::Copy => "copy",
            EditCommand::Cut => "cut",
            EditCommand::Paste => "paste",
            EditCommand::Crop => "crop",
            EditCommand::Delete => "delete",
            EditCommand::AddTrack => "add_track",
            EditCommand::InsertTrack(_) => "insert_track",
            EditCommand::DeleteTrack(_) => "delete_track",
            EditCommand::SelectAll => "select_all",
            EditCommand::SelectNone => "select_none",
            EditCommand::SelectRange { .. } => "select_range",
            EditCommand::SelectTrack(..) => "select_track",
            EditCommand::SelectAllTracks => "select_all_tracks",
            EditCommand::InvertTrackSelection => "invert_track_selection",
            EditCommand::InsertSilence(_) => "insert_silence",
            EditCommand::ClearClipboard => "clear_clipboard",
        }
    }

    /// Transaction name, `None` for commands that run outside a transaction
    pub fn description(&self) -> Option<&'static str> {
        match self {
            EditCommand::Undo | EditCommand::Redo | EditCommand::Copy | EditCommand::ClearClipboard => {
                None
            }
            EditCommand::Cut => Some("Cut"),
            EditCommand::Paste => Some("Paste"),
            EditCommand::Crop => Some("Crop"),
            EditCommand::Delete => Some("Delete"),
            EditCommand::AddTrack | EditCommand::InsertTrack(_) => Some("Insert Track"),
            EditCommand::DeleteTrack(_) => Some("Delete Track"),
            EditCommand::InsertSilence(_) => Some("Insert Silence"),
            EditCommand::SelectAll
            | EditCommand::SelectNone
            | EditCommand::SelectRange { .. }
            | EditCommand::SelectTrack(..)
            | EditCommand::SelectAllTracks
            | EditCommand::InvertTrackSelection => Some("Selection"),
        }
    }
}

impl fmt::Display for EditCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditCommand::InsertTrack(i) | EditCommand::DeleteTrack(i) => {
                write!(f, "{}({})", self.name(), i)
            }
            EditCommand::SelectRange { offset, length } => {
                write!(f, "{}({}, {})", self.name(), offset, length)
            }
            EditCommand::SelectTrack(i, how) => {
                let how = match how {
                    TrackSelect::On => "on",
                    TrackSelect::Off => "off",
                    TrackSelect::Toggle => "toggle",
                };
                write!(f, "{}:{}({})", self.name(), how, i)
            }
            EditCommand::InsertSilence(n) => write!(f, "{}({})", self.name(), n),
            _ => write!(f, "{}()", self.name()),
        }
    }
}

/// `name`, optional `:sub`, and raw argument strings
struct RawCommand<'a> {
    name: &'a str,
    sub: Option<&'a str>,
    args: Vec<&'a str>,
}

fn split(text: &str) -> SfResult<RawCommand<'_>> {
    let text = text.trim();
    let invalid = || SfError::InvalidCommand(text.to_string());

    let (head, args) = match text.find('(') {
        Some(open) => {
            let inner = text[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
            if inner.contains('(') || inner.contains(')') {
                return Err(invalid());
            }
            let args: Vec<&str> = if inner.trim().is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(str::trim).collect()
            };
            (text[..open].trim_end(), args)
        }
        None => (text, Vec::new()),
    };
    let valid = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let (name, sub) = match head.split_once(':') {
        Some((name, sub)) => (name, Some(sub)),
        None => (head, None),
    };
    if !valid(name) || sub.is_some_and(|s| !valid(s)) || args.iter().any(|a| a.is_empty()) {
        return Err(invalid());
    }
    Ok(RawCommand { name, sub, args })
}

impl RawCommand<'_> {
    fn arity(&self, n: usize) -> SfResult<()> {
        if self.args.len() != n {
            return Err(SfError::InvalidCommand(format!(
                "{} takes {} argument(s), got {}",
                self.name,
                n,
                self.args.len()
            )));
        }
        Ok(())
    }

    fn number<T: FromStr>(&self, index: usize) -> SfResult<T> {
        self.args[index].parse().map_err(|_| {
            SfError::InvalidCommand(format!("{}: '{}' is not a number", self.name, self.args[index]))
        })
    }

    fn no_sub(&self) -> SfResult<()> {
        match self.sub {
            Some(sub) => Err(SfError::InvalidCommand(format!("{}:{}", self.name, sub))),
            None => Ok(()),
        }
    }
}

impl FromStr for EditCommand {
    type Err = SfError;

    fn from_str(text: &str) -> SfResult<Self> {
        let raw = split(text)?;
        let simple = |cmd: EditCommand| -> SfResult<EditCommand> {
            raw.no_sub()?;
            raw.arity(0)?;
            Ok(cmd)
        };
        match raw.name {
            "undo" => simple(EditCommand::Undo),
            "redo" => simple(EditCommand::Redo),
            "copy" => simple(EditCommand::Copy),
            "cut" => simple(EditCommand::Cut),
            "paste" => simple(EditCommand::Paste),
            "crop" => simple(EditCommand::Crop),
            "delete" => simple(EditCommand::Delete),
            "add_track" => simple(EditCommand::AddTrack),
            "select_all" => simple(EditCommand::SelectAll),
            "select_none" => simple(EditCommand::SelectNone),
            "select_all_tracks" => simple(EditCommand::SelectAllTracks),
            "invert_track_selection" => simple(EditCommand::InvertTrackSelection),
            "clear_clipboard" => simple(EditCommand::ClearClipboard),
            "insert_track" | "delete_track" | "insert_silence" => {
                raw.no_sub()?;
                raw.arity(1)?;
                Ok(match raw.name {
                    "insert_track" => EditCommand::InsertTrack(raw.number(0)?),
                    "delete_track" => EditCommand::DeleteTrack(raw.number(0)?),
                    _ => EditCommand::InsertSilence(raw.number(0)?),
                })
            }
            "select_range" => {
                raw.no_sub()?;
                raw.arity(2)?;
                Ok(EditCommand::SelectRange {
                    offset: raw.number(0)?,
                    length: raw.number(1)?,
                })
            }
            "select_track" => {
                let how = match raw.sub {
                    Some("on") | None => TrackSelect::On,
                    Some("off") => TrackSelect::Off,
                    Some("toggle") => TrackSelect::Toggle,
                    Some(other) => {
                        return Err(SfError::InvalidCommand(format!("select_track:{}", other)));
                    }
                };
                raw.arity(1)?;
                Ok(EditCommand::SelectTrack(raw.number(0)?, how))
            }
            other => Err(SfError::NotImplemented(other.to_string())),
        }
    }
}

impl SignalManager {
    /// Parse and run one text command
    pub fn execute_command(&self, text: &str) -> SfResult<()> {
        let command: EditCommand = text.parse().inspect_err(|err| {
            log::warn!("rejected command '{}': {}", text.trim(), err);
        })?;
        self.execute(command)
    }

    pub fn execute(&self, command: EditCommand) -> SfResult<()> {
        log::debug!("executing {}", command);
        let result = match command.description() {
            Some(description) => self.with_transaction(description, |m| m.run(command)),
            None => self.run(command),
        };
        if let Err(err) = &result {
            log::warn!("command {} failed: {}", command, err);
        }
        result
    }

    fn run(&self, command: EditCommand) -> SfResult<()> {
        match command {
            EditCommand::Undo => self.undo().map(drop),
            EditCommand::Redo => self.redo().map(drop),
            EditCommand::Copy => self.copy().map(drop),
            EditCommand::Cut => self.cut().map(drop),
            EditCommand::Paste => self.paste().map(drop),
            EditCommand::Crop => self.crop().map(drop),
            EditCommand::Delete => self.delete_selection().map(drop),
            EditCommand::AddTrack => self.append_track().map(drop),
            EditCommand::InsertTrack(index) => self.insert_track(index).map(drop),
            EditCommand::DeleteTrack(index) => self.delete_track(index),
            EditCommand::SelectAll => {
                self.select_all();
                Ok(())
            }
            EditCommand::SelectNone => {
                self.select_none();
                Ok(())
            }
            EditCommand::SelectRange { offset, length } => {
                self.select_range(offset, length);
                Ok(())
            }
            EditCommand::SelectTrack(index, how) => self.select_track(index, how),
            EditCommand::SelectAllTracks => self.select_all_tracks(),
            EditCommand::InvertTrackSelection => self.invert_track_selection(),
            EditCommand::InsertSilence(length) => {
                let offset = self.selection().offset;
                self.insert_space(offset, length, &self.selected_tracks())?;
                self.select_range(offset, length);
                Ok(())
            }
            EditCommand::ClearClipboard => {
                self.clipboard().clear();
                Ok(())
            }
        }
    }
}
