//! # Shell commands
//!
//! Parsing and report formatting for the kernel shell. Execution lives in
//! the kernel binary, which owns the devices; everything here is pure so the
//! command grammar and output formats can be tested on the host.
//!
//! ## Available Commands
//!
//! ### General
//! - `help`, `ver`, `clear`, `echo [text]`, `uptime`
//!
//! ### Files
//! - `dir` / `ls`, `type FILE` / `cat FILE`, `write FILE TEXT`,
//!   `del FILE` / `rm FILE`
//!
//! ### System
//! - `mem`, `ps`, `spawn NAME`, `kill ID`, `selftest`

use core::fmt::{self, Write};

use crate::memory::{HeapStats, MemoryReport};
use crate::storage::DirEntry;
use crate::task::{TaskId, TaskInfo, TaskState};

pub const PROMPT: &str = "C:\\>";

pub const HELP_TEXT: &str = "Commands:\n  \
    help            - Show this help\n  \
    ver             - Show version\n  \
    clear           - Clear screen\n  \
    echo ..         - Echo text\n  \
    uptime          - Show uptime\n  \
    dir / ls        - List files on disk\n  \
    type FILE       - Display file contents (also: cat)\n  \
    write FILE TEXT - Create a file\n  \
    del FILE        - Delete a file (also: rm)\n  \
    mem             - Memory and heap usage\n  \
    ps              - List tasks\n  \
    spawn NAME      - Start a task (counter, spinner, idle)\n  \
    kill ID         - Stop a task\n  \
    selftest        - Run kernel self-tests\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Empty,
    Help,
    Ver,
    Clear,
    Echo(&'a str),
    Uptime,
    Dir,
    Type(&'a str),
    Write { name: &'a str, text: &'a str },
    Delete(&'a str),
    Mem,
    Ps,
    Spawn(&'a str),
    Kill(TaskId),
    SelfTest,
    /// Known command, bad arguments; holds the usage line.
    Usage(&'static str),
    Unknown(&'a str),
}

/// Splits off the first word; the rest keeps its inner spacing.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start_matches(' ');
    match s.find(' ') {
        Some(at) => (&s[..at], &s[at + 1..]),
        None => (s, ""),
    }
}

fn one_arg<'a>(rest: &'a str, usage: &'static str, make: fn(&'a str) -> Command<'a>) -> Command<'a> {
    match split_word(rest) {
        ("", _) => Command::Usage(usage),
        (arg, _) => make(arg),
    }
}

pub fn parse(line: &str) -> Command<'_> {
    let (cmd, rest) = split_word(line.trim_end());
    match cmd {
        "" => Command::Empty,
        "help" => Command::Help,
        "ver" => Command::Ver,
        "clear" => Command::Clear,
        "echo" => Command::Echo(rest),
        "uptime" => Command::Uptime,
        "dir" | "ls" => Command::Dir,
        "type" | "cat" => one_arg(rest, "usage: type FILE", Command::Type),
        "del" | "rm" => one_arg(rest, "usage: del FILE", Command::Delete),
        "spawn" => one_arg(rest, "usage: spawn NAME", Command::Spawn),
        "write" => match split_word(rest) {
            ("", _) => Command::Usage("usage: write FILE TEXT"),
            (name, text) => Command::Write { name, text },
        },
        "kill" => match split_word(rest).0.parse() {
            Ok(id) => Command::Kill(id),
            Err(_) => Command::Usage("usage: kill ID"),
        },
        "mem" => Command::Mem,
        "ps" => Command::Ps,
        "selftest" => Command::SelfTest,
        other => Command::Unknown(other),
    }
}

/// `<m>m <s>s (<ticks> ticks)`
pub fn format_uptime(out: &mut impl Write, ticks: u64, hz: u32) -> fmt::Result {
    let secs = ticks / u64::from(hz);
    writeln!(out, "{}m {}s ({} ticks)", secs / 60, secs % 60, ticks)
}

pub fn format_dir(out: &mut impl Write, entries: &[DirEntry]) -> fmt::Result {
    for entry in entries {
        writeln!(out, "  {:<20}{} bytes", entry.name(), entry.size)?;
    }
    if entries.is_empty() {
        writeln!(out, "  (no files)")?;
    }
    writeln!(out, "{} file(s)", entries.len())
}

pub fn format_tasks(out: &mut impl Write, tasks: impl Iterator<Item = TaskInfo>) -> fmt::Result {
    writeln!(out, "  ID  NAME              STATE")?;
    for task in tasks {
        let state = match task.state {
            TaskState::Active => "active",
            TaskState::Inactive => "done",
        };
        let marker = if task.current { '*' } else { ' ' };
        writeln!(out, "{} {:>2}  {:<16}  {}", marker, task.id, task.name.as_str(), state)?;
    }
    Ok(())
}

pub fn format_memory(out: &mut impl Write, map: &MemoryReport, heap: &HeapStats) -> fmt::Result {
    writeln!(
        out,
        "Memory map: {} KB usable, {} KB reserved, {} regions",
        map.usable / 1024,
        map.reserved / 1024,
        map.regions
    )?;
    writeln!(
        out,
        "Heap: {} KB arena, {} bytes used, {} bytes free",
        heap.arena / 1024,
        heap.used,
        heap.free
    )?;
    writeln!(
        out,
        "      {} blocks ({} free), largest free {} bytes",
        heap.blocks, heap.free_blocks, heap.largest_free
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::FileSystem;
    use crate::storage::testing::MemDisk;
    use crate::task::TaskName;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(parse(""), Command::Empty);
        assert_eq!(parse("   "), Command::Empty);
        assert_eq!(parse("help"), Command::Help);
        assert_eq!(parse("  ls "), Command::Dir);
        assert_eq!(parse("cat hello.txt"), Command::Type("hello.txt"));
        assert_eq!(parse("rm a"), Command::Delete("a"));
        assert_eq!(parse("kill 3"), Command::Kill(3));
        assert_eq!(parse("spawn counter"), Command::Spawn("counter"));
        assert_eq!(parse("frobnicate now"), Command::Unknown("frobnicate"));
    }

    #[test]
    fn echo_and_write_keep_spacing() {
        assert_eq!(parse("echo"), Command::Echo(""));
        assert_eq!(parse("echo hello  world"), Command::Echo("hello  world"));
        assert_eq!(
            parse("write note.txt buy  milk"),
            Command::Write { name: "note.txt", text: "buy  milk" }
        );
        assert_eq!(parse("write x"), Command::Write { name: "x", text: "" });
    }

    #[test]
    fn missing_arguments_give_usage() {
        assert_eq!(parse("type"), Command::Usage("usage: type FILE"));
        assert_eq!(parse("write"), Command::Usage("usage: write FILE TEXT"));
        assert_eq!(parse("kill"), Command::Usage("usage: kill ID"));
        assert_eq!(parse("kill two"), Command::Usage("usage: kill ID"));
    }

    #[test]
    fn uptime_format() {
        let mut s = String::new();
        format_uptime(&mut s, 12_345, 100).unwrap();
        assert_eq!(s, "2m 3s (12345 ticks)\n");
    }

    #[test]
    fn dir_format() {
        let mut s = String::new();
        format_dir(&mut s, &[]).unwrap();
        assert_eq!(s, "  (no files)\n0 file(s)\n");

        let mut fs = FileSystem::new(MemDisk::default());
        fs.write("hello.txt", b"Hello from Chocola!\n").unwrap();
        let mut s = String::new();
        format_dir(&mut s, &fs.list().unwrap()).unwrap();
        assert_eq!(s, "  hello.txt           20 bytes\n1 file(s)\n");
    }

    #[test]
    fn task_table_format() {
        let tasks = [
            TaskInfo { id: 0, name: TaskName::new("shell"), state: TaskState::Active, current: true },
            TaskInfo { id: 2, name: TaskName::new("counter"), state: TaskState::Inactive, current: false },
        ];
        let mut s = String::new();
        format_tasks(&mut s, tasks.into_iter()).unwrap();
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines[1], "*  0  shell             active");
        assert_eq!(lines[2], "   2  counter           done");
    }
}
