//! The interactive command session.
//!
//! A session owns the backend, the probed device, the in-memory table, and
//! the prompter. Commands are a closed enumeration; every handler returns a
//! [`CommandOutcome`] which the loop inspects, so there is no
//! exception-style control flow for exiting.

use std::io;
use std::path::Path;

use rfdisk_common::backend::{DiskBackend, LoadError};
use rfdisk_common::device::Device;
use rfdisk_common::disk::table::{Disk, PartitionFlag, PartitionType};
use rfdisk_common::disk::Geometry;
use rfdisk_common::Anyhow;

use crate::planner::{self, TypeMenu};
use crate::present;
use crate::prompt::{self, Prompter};

/// Single-letter commands of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleBootable,
    DeletePartition,
    PrintMenu,
    AddPartition,
    CreateEmpty,
    PrintTable,
    Quit,
    Write,
}

impl Command {
    /// All commands in menu order.
    pub const ALL: [Command; 8] = [
        Command::ToggleBootable,
        Command::DeletePartition,
        Command::PrintMenu,
        Command::AddPartition,
        Command::CreateEmpty,
        Command::PrintTable,
        Command::Quit,
        Command::Write,
    ];

    pub fn from_char(key: char) -> Option<Self> {
        match key {
            'a' => Some(Command::ToggleBootable),
            'd' => Some(Command::DeletePartition),
            'm' => Some(Command::PrintMenu),
            'n' => Some(Command::AddPartition),
            'o' => Some(Command::CreateEmpty),
            'p' => Some(Command::PrintTable),
            'q' => Some(Command::Quit),
            'w' => Some(Command::Write),
            _ => None,
        }
    }

    pub fn key(self) -> char {
        match self {
            Command::ToggleBootable => 'a',
            Command::DeletePartition => 'd',
            Command::PrintMenu => 'm',
            Command::AddPartition => 'n',
            Command::CreateEmpty => 'o',
            Command::PrintTable => 'p',
            Command::Quit => 'q',
            Command::Write => 'w',
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Command::ToggleBootable => "toggle a bootable flag",
            Command::DeletePartition => "delete a partition",
            Command::PrintMenu => "print this menu",
            Command::AddPartition => "add a new partition",
            Command::CreateEmpty => "create a new empty DOS partition table",
            Command::PrintTable => "print the partition table",
            Command::Quit => "quit without saving changes",
            Command::Write => "write table to disk and exit",
        }
    }
}

/// Signal returned by every command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep accepting commands.
    Continue,
    /// End the session with the given exit code.
    Terminate(i32),
}

/// One interactive editing session for a single device.
pub struct Session<B, P> {
    backend: B,
    device: Device,
    disk: Disk,
    prompter: P,
}

impl<B: DiskBackend, P: Prompter> Session<B, P> {
    /// Probe the device and load its table.
    ///
    /// A device without a recognized label gets a fresh in-memory msdos
    /// label; a device with a non-msdos label is rejected.
    pub fn new(backend: B, path: &Path, prompter: P) -> Anyhow<Self> {
        let device = backend.probe(path)?;
        let disk = match backend.load(&device) {
            Ok(disk) => disk,
            Err(LoadError::NoTable) => {
                print_fresh_disklabel_banner();
                backend.create_empty(&device)
            }
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            backend,
            device,
            disk,
            prompter,
        })
    }

    /// Run the command loop until a terminal command, returning the exit
    /// code. End of input at the main prompt quits like `q`.
    pub fn run(&mut self) -> Anyhow<i32> {
        loop {
            let line = match self.prompter.read_line("\nCommand (m for help): ") {
                Ok(line) => line,
                Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                Err(error) => return Err(error.into()),
            };
            let outcome = match line.trim().chars().next().and_then(Command::from_char) {
                Some(command) => self.dispatch(command)?,
                None => {
                    // Unknown commands are not errors; show the menu.
                    self.print_menu();
                    CommandOutcome::Continue
                }
            };
            if let CommandOutcome::Terminate(code) = outcome {
                return Ok(code);
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Anyhow<CommandOutcome> {
        match command {
            Command::ToggleBootable => self.toggle_bootable(),
            Command::DeletePartition => self.delete_partition(),
            Command::PrintMenu => {
                self.print_menu();
                Ok(CommandOutcome::Continue)
            }
            Command::AddPartition => self.add_partition(),
            Command::CreateEmpty => {
                print_fresh_disklabel_banner();
                self.disk = self.backend.create_empty(&self.device);
                Ok(CommandOutcome::Continue)
            }
            Command::PrintTable => {
                present::print_disk(&self.device, &self.disk);
                Ok(CommandOutcome::Continue)
            }
            Command::Quit => Ok(CommandOutcome::Terminate(0)),
            Command::Write => self.write_table(),
        }
    }

    fn toggle_bootable(&mut self) -> Anyhow<CommandOutcome> {
        if self.disk.is_empty() {
            println!("No partition is defined yet!");
            return Ok(CommandOutcome::Continue);
        }
        let number = prompt::ask_partition(&mut self.prompter, self.disk.last_partition_number())?;
        if let Some(partition) = self.disk.find_partition_mut(number) {
            partition.toggle_flag(PartitionFlag::Boot);
        }
        Ok(CommandOutcome::Continue)
    }

    fn delete_partition(&mut self) -> Anyhow<CommandOutcome> {
        if self.disk.is_empty() {
            println!("No partition is defined yet!");
            return Ok(CommandOutcome::Continue);
        }
        let number = prompt::ask_partition(&mut self.prompter, self.disk.last_partition_number())?;
        if let Err(error) = self.disk.delete_partition(number) {
            println!("{error}");
        }
        Ok(CommandOutcome::Continue)
    }

    fn print_menu(&self) {
        println!("Command action");
        for command in Command::ALL {
            println!("{:^7}{}", command.key(), command.describe());
        }
    }

    fn add_partition(&mut self) -> Anyhow<CommandOutcome> {
        let Some(region) = planner::largest_free_region(&self.disk, &self.device) else {
            println!("No free sectors available");
            return Ok(CommandOutcome::Continue);
        };

        let menu = TypeMenu::survey(&self.disk);
        if !menu.any_eligible() {
            indoc::printdoc! {"
                If you want to create more than four partitions, you must replace a
                primary partition with an extended partition first.
            "};
            return Ok(CommandOutcome::Continue);
        }

        println!("Partition type:");
        if menu.allow_primary {
            println!(
                "   p   primary ({} primary, {} extended, {} free)",
                menu.primary_count,
                u8::from(menu.has_extended),
                menu.spare_slots
            );
            if menu.allow_extended {
                println!("   e   extended");
            }
        }
        if menu.allow_logical {
            println!("   l   logical (numbered from {})", menu.first_logical);
        }

        let default = menu.default.expect("an eligible type implies a default");
        let line = self
            .prompter
            .read_line(&format!("Select (default {}): ", type_key(default)))?;
        let line = line.trim();
        let choice = if line.is_empty() {
            println!("Using default response {}", type_key(default));
            default
        } else {
            match line.chars().next().and_then(type_from_key) {
                Some(ty) if menu.is_eligible(ty) => ty,
                _ => {
                    println!("Invalid partition type `{line}'");
                    return Ok(CommandOutcome::Continue);
                }
            }
        };

        let Some(region) = planner::resolve_region(&self.disk, choice, region) else {
            println!("No free sectors available");
            return Ok(CommandOutcome::Continue);
        };
        let Some((default_start, default_end)) = planner::aligned_bounds(region, &self.device)
        else {
            println!("No free sectors available");
            return Ok(CommandOutcome::Continue);
        };

        let first = prompt::ask_value(
            &mut self.prompter,
            &format!("First sector ({default_start}-{default_end}, default {default_start}): "),
            Some(default_start),
            |input| input.parse().ok(),
        )?;
        let sector_size = self.device.sector_size;
        let last = prompt::ask_value(
            &mut self.prompter,
            &format!(
                "Last sector, +sectors or +size{{K,M,G}} \
                 ({default_start}-{default_end}, default {default_end}): "
            ),
            Some(default_end),
            |input| planner::parse_last_sector_expr(first, input, sector_size).ok(),
        )?;

        match self.disk.add_partition(choice, Geometry::new(first, last)) {
            Ok(number) => println!("Partition number {number} created"),
            Err(error) => println!("{error}"),
        }
        Ok(CommandOutcome::Continue)
    }

    fn write_table(&mut self) -> Anyhow<CommandOutcome> {
        if let Err(error) = self.backend.commit(&self.device, &self.disk) {
            eprintln!("{error:#}");
            return Ok(CommandOutcome::Terminate(1));
        }
        Ok(CommandOutcome::Terminate(0))
    }

    #[cfg(test)]
    fn disk(&self) -> &Disk {
        &self.disk
    }
}

fn print_fresh_disklabel_banner() {
    println!();
    indoc::printdoc! {"
        Device contains no valid DOS partition table.
        Building a new DOS disklabel.
        Changes will remain in memory only, until you decide to write them.
        After that, of course, the previous content won't be recoverable.
    "};
}

fn type_key(ty: PartitionType) -> char {
    match ty {
        PartitionType::Primary => 'p',
        PartitionType::Extended => 'e',
        PartitionType::Logical => 'l',
    }
}

fn type_from_key(key: char) -> Option<PartitionType> {
    match key {
        'p' => Some(PartitionType::Primary),
        'e' => Some(PartitionType::Extended),
        'l' => Some(PartitionType::Logical),
        _ => None,
    }
}
