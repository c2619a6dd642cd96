//! Terminal command parsing and rendering.
//!
//! The UI side of the session boundary: parses typed commands from input
//! lines and renders the session's events. No feed logic lives here.

use confess_core::Confession;

use crate::session::UiEvent;

/// Label shown for records without an author.
const ANONYMOUS: &str = "anonymous";

/// A user-invocable terminal command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Confess(String),
    Feed,
    Clear,
    About,
    Status,
    Quit,
}

/// Parse one input line into a command. Returns the unrecognized command
/// word on failure so the caller can echo it.
pub fn parse_command(input: &str) -> Result<Command, String> {
    let mut parts = input.trim().splitn(2, ' ');
    let word = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().unwrap_or("").to_string();

    match word.as_str() {
        "help" => Ok(Command::Help),
        "confess" => Ok(Command::Confess(rest)),
        "feed" => Ok(Command::Feed),
        "clear" => Ok(Command::Clear),
        "about" => Ok(Command::About),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(word),
    }
}

pub fn print_welcome() {
    println!("Welcome to Confess - Anonymous Confessions");
    println!("Type 'help' for available commands");
}

pub fn print_help() {
    println!("Available commands:");
    println!("  confess <message> - Post an anonymous confession");
    println!("  feed              - View recent confessions");
    println!("  status            - Show connection status");
    println!("  clear             - Clear the terminal");
    println!("  about             - About Confess");
    println!("  help              - Show this help message");
    println!("  quit              - Exit");
}

pub fn print_about() {
    println!("Confess v0.1.0");
    println!("A terminal for anonymous confessions");
    println!();
    println!("Confessions sync live across everyone connected to the feed.");
    println!("Without a server they are stored locally and anonymously.");
}

pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    print_welcome();
}

pub fn print_unknown(word: &str) {
    println!("Command not found: {}", word);
    println!("Type \"help\" for available commands");
}

/// Render one confession: a meta line, then the quoted message.
pub fn render_confession(record: &Confession) {
    let author = record.author.as_deref().unwrap_or(ANONYMOUS);
    println!("[{}] {}", record.display_time, author);
    println!("\"{}\"", record.message);
}

/// Print a session event.
pub fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Rendered(record) => render_confession(record),
        UiEvent::Status(text) => println!("* {}", text),
        UiEvent::Notice(text) => println!("{}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command("help"), Ok(Command::Help));
        assert_eq!(parse_command("FEED"), Ok(Command::Feed));
        assert_eq!(parse_command(" clear "), Ok(Command::Clear));
        assert_eq!(parse_command("about"), Ok(Command::About));
        assert_eq!(parse_command("status"), Ok(Command::Status));
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_confess_keeps_message_untouched() {
        assert_eq!(
            parse_command("confess I did a thing"),
            Ok(Command::Confess("I did a thing".to_string()))
        );
        // empty message is still a confess command; validation happens
        // in the session, which surfaces the usage error
        assert_eq!(parse_command("confess"), Ok(Command::Confess(String::new())));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse_command("dance party"), Err("dance".to_string()));
    }
}
