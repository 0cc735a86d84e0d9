//! Interactive console menu.
//!
//! ```text
//! Please select an operation:
//! 1. Take Screenshot
//! 2. Record Video
//! 3. Clean Screenshots Folder
//! 4. Clean Videos Folder
//! 5. Exit
//! Your choice:
//! ```
//!
//! Generic over `BufRead`/`Write` so the prompts run against stdin/stdout
//! in the binary and against in-memory buffers in tests. End of input is
//! treated as "Exit" / "no".

use std::io::{self, BufRead, Write};
use std::path::Path;

use screenrec_core::DisplayDescriptor;

use crate::storage::{clean_directory, list_outputs, CleanOutcome, OutputKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Screenshot,
    Record,
    Clean(OutputKind),
    Exit,
}

impl MenuChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Screenshot),
            "2" => Some(Self::Record),
            "3" => Some(Self::Clean(OutputKind::Screenshots)),
            "4" => Some(Self::Clean(OutputKind::Videos)),
            "5" => Some(Self::Exit),
            _ => None,
        }
    }
}

fn folder_label(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Screenshots => "Screenshots",
        OutputKind::Videos      => "Videos",
    }
}

// ── Prompter ──────────────────────────────────────────────────────────────────

pub struct Prompter<R, W> {
    input:  R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, line: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", line.as_ref())
    }

    /// Print `prompt` and read one line; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    /// Show the main menu until a valid option is entered.
    pub fn choose_action(&mut self) -> io::Result<MenuChoice> {
        loop {
            self.say("\nPlease select an operation:")?;
            self.say("1. Take Screenshot")?;
            self.say("2. Record Video")?;
            self.say("3. Clean Screenshots Folder")?;
            self.say("4. Clean Videos Folder")?;
            self.say("5. Exit")?;
            let Some(answer) = self.ask("Your choice: ")? else {
                return Ok(MenuChoice::Exit);
            };
            match MenuChoice::parse(&answer) {
                Some(choice) => return Ok(choice),
                None => self.say("Invalid choice, please try again")?,
            }
        }
    }

    /// List `displays` and read a 1-based selection. `None` when there is
    /// nothing to choose from or input ended.
    pub fn choose_display(&mut self, displays: &[DisplayDescriptor]) -> io::Result<Option<DisplayDescriptor>> {
        if displays.is_empty() {
            self.say("No monitors found")?;
            return Ok(None);
        }
        self.say("\nAvailable Monitors:")?;
        for display in displays {
            self.say(format!("{}. {}", display.index, display))?;
        }
        self.say("\nNote: Primary monitor is usually the built-in laptop screen")?;

        let prompt = format!("\nSelect monitor (1-{}): ", displays.len());
        loop {
            let Some(answer) = self.ask(&prompt)? else { return Ok(None) };
            match answer.parse::<usize>() {
                Ok(n) if (1..=displays.len()).contains(&n) => return Ok(Some(displays[n - 1].clone())),
                Ok(_) => self.say("Invalid choice, please try again")?,
                Err(_) => self.say("Please enter a valid number")?,
            }
        }
    }

    /// Ask a y/n question until answered.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let prompt = format!("{question} (y/n): ");
        loop {
            let Some(answer) = self.ask(&prompt)? else { return Ok(false) };
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n")?,
            }
        }
    }

    /// Empty `<root>/<kind>` after confirmation. `None` if the operator
    /// declined.
    pub fn clean_folder(&mut self, root: &Path, kind: OutputKind) -> io::Result<Option<CleanOutcome>> {
        let label = folder_label(kind);
        let files = match list_outputs(root, kind)? {
            None => {
                self.say(format!("{label} folder does not exist"))?;
                return Ok(Some(CleanOutcome::Missing));
            }
            Some(files) if files.is_empty() => {
                self.say(format!("{label} folder is already empty"))?;
                return Ok(Some(CleanOutcome::AlreadyEmpty));
            }
            Some(files) => files,
        };

        self.say(format!("There are {} files in the folder", files.len()))?;
        if !self.confirm(&format!("Are you sure you want to delete all {}?", label.to_lowercase()))? {
            self.say("Operation cancelled")?;
            return Ok(None);
        }

        let outcome = clean_directory(root, kind)?;
        if let CleanOutcome::Removed { failed, .. } = &outcome {
            for (file, reason) in failed {
                self.say(format!("Error deleting {}: {}", file.display(), reason))?;
            }
            if failed.is_empty() {
                self.say(format!("All {} files have been deleted", label.to_lowercase()))?;
            }
        }
        Ok(Some(outcome))
    }
}
