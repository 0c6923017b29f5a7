//! The interactive shell, running as task 0.

use alloc::string::String;
use core::fmt::{self, Write};

use chocola::config::{FILE_BUF_SIZE, TIMER_HZ};
use chocola::input::LineEditor;
use chocola::shell::{self, Command, HELP_TEXT, PROMPT};
use chocola::task::TaskId;

use super::{
    delete_file, kill_task, list_files, list_tasks, read_file, read_line, selftest, spawn_task,
    tasks, ticks, with_console, write_file, ALLOCATOR, MEMORY_MAP,
};

/// `fmt::Write` onto the console.
struct Screen;

impl Write for Screen {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        with_console(|c| c.put_string(s));
        Ok(())
    }
}

pub fn run() -> ! {
    kprintln!("Chocola Ver{}", env!("CARGO_PKG_VERSION"));
    kprintln!("Type 'help' for a list of commands.\n");

    let mut editor = LineEditor::new();
    loop {
        kprint!("{}", PROMPT);
        let line = read_line(&mut editor);
        execute(&line);
    }
}

fn execute(line: &str) {
    match shell::parse(line) {
        Command::Empty => {}
        Command::Help => kprint!("{}", HELP_TEXT),
        Command::Ver => kprintln!("Chocola Ver{}", env!("CARGO_PKG_VERSION")),
        Command::Clear => {
            with_console(|c| c.clear_screen());
        }
        Command::Echo(text) => kprintln!("{}", text),
        Command::Uptime => {
            let _ = shell::format_uptime(&mut Screen, ticks(), TIMER_HZ);
        }
        Command::Dir => match list_files() {
            Ok(files) => {
                let _ = shell::format_dir(&mut Screen, &files);
            }
            Err(e) => kprintln!("dir: {}", e),
        },
        Command::Type(name) => match read_file(name) {
            Ok(data) => {
                kprint!("{}", String::from_utf8_lossy(&data));
                if data.last() != Some(&b'\n') {
                    kprintln!();
                }
            }
            Err(e) => kprintln!("type: {}: {}", name, e),
        },
        Command::Write { name, text } => write(name, text),
        Command::Delete(name) => match delete_file(name) {
            Ok(()) => kprintln!("Deleted {}", name),
            Err(e) => kprintln!("del: {}: {}", name, e),
        },
        Command::Mem => {
            let map = MEMORY_MAP.get().copied().unwrap_or_default();
            let _ = shell::format_memory(&mut Screen, &map, &ALLOCATOR.stats());
        }
        Command::Ps => {
            let _ = shell::format_tasks(&mut Screen, list_tasks().into_iter());
        }
        Command::Spawn(name) => spawn(name),
        Command::Kill(id) => kill(id),
        Command::SelfTest => kprint!("{}", selftest::run_all()),
        Command::Usage(usage) => kprintln!("{}", usage),
        Command::Unknown(cmd) => kprintln!("Unknown command: {}", cmd),
    }
}

/// Stores `text` plus a trailing newline.
fn write(name: &str, text: &str) {
    if text.len() + 1 > FILE_BUF_SIZE {
        kprintln!("write: file larger than {} bytes", FILE_BUF_SIZE);
        return;
    }
    let mut data = String::with_capacity(text.len() + 1);
    data.push_str(text);
    data.push('\n');
    match write_file(name, data.as_bytes()) {
        Ok(entry) => kprintln!("Wrote {} bytes to {}", entry.size, name),
        Err(e) => kprintln!("write: {}: {}", name, e),
    }
}

fn spawn(name: &str) {
    let Some(entry) = tasks::lookup(name) else {
        kprintln!("spawn: unknown program '{}'. Available:", name);
        for (name, _, about) in tasks::CATALOG {
            kprintln!("  {:<10}{}", name, about);
        }
        return;
    };
    match spawn_task(entry, name) {
        Ok(id) => kprintln!("Started {} as task {}", name, id),
        Err(e) => kprintln!("spawn: {}", e),
    }
}

fn kill(id: TaskId) {
    if id == 0 {
        kprintln!("kill: the shell can not be killed");
        return;
    }
    match kill_task(id) {
        Ok(()) => kprintln!("Killed task {}", id),
        Err(e) => kprintln!("kill: {}: {}", id, e),
    }
}
