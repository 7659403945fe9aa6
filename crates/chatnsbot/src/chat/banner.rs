//! Terminal output for the chat loop.
//!
//! Everything here writes to a caller-supplied writer so the loop can be
//! exercised against an in-memory buffer.

use std::io::{self, Write};

use chatns_core::{GatewayError, Session};
use console::style;

/// Prompt shown before each line of input.
pub const PROMPT: &str = "You: ";

const RULE: &str = "================================================================";

/// Print the greeting shown once the session is ready.
///
/// # Errors
/// Returns error if the writer fails.
pub fn print_welcome(
    out: &mut impl Write,
    session: &Session,
    model: &str,
    addr: &str,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).dim())?;
    writeln!(out, "  {} - powered by {}", style("chatnsbot").cyan().bold(), session.provider)?;
    writeln!(out, "{}", style(RULE).dim())?;
    writeln!(out)?;
    writeln!(out, "  {}   {}", style("Gateway:").bold(), style(addr).dim())?;
    writeln!(out, "  {}   {}", style("Session:").bold(), style(&session.id).dim())?;
    writeln!(out, "  {}     {}", style("Model:").bold(), style(model).dim())?;
    print_help(out)?;
    writeln!(out, "  Type your message and press Enter to chat.")?;
    writeln!(out)?;
    Ok(())
}

/// Print the command summary.
///
/// # Errors
/// Returns error if the writer fails.
pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {}", style("Commands:").bold())?;
    writeln!(out, "    {}  Clear conversation history", style("/clear").cyan())?;
    writeln!(out, "    {}   Exit (alias /exit)", style("/quit").cyan())?;
    writeln!(out, "    {}   Show this help", style("/help").cyan())?;
    writeln!(out)?;
    Ok(())
}

/// Print a reply. The reply text is written verbatim on its own lines.
///
/// # Errors
/// Returns error if the writer fails.
pub fn print_reply(out: &mut impl Write, provider: &str, reply: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(format!("{provider}:")).green().bold())?;
    writeln!(out, "{reply}")?;
    writeln!(out)?;
    Ok(())
}

/// Print a failed turn as a single line.
///
/// # Errors
/// Returns error if the writer fails.
pub fn print_turn_error(out: &mut impl Write, err: &GatewayError) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} {err}", style("Error:").red().bold())?;
    writeln!(out)?;
    Ok(())
}

/// # Errors
/// Returns error if the writer fails.
pub fn print_cleared(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Conversation history cleared")?;
    writeln!(out)?;
    Ok(())
}

/// # Errors
/// Returns error if the writer fails.
pub fn print_goodbye(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Goodbye!")?;
    Ok(())
}

/// Print why startup failed.
///
/// # Errors
/// Returns error if the writer fails.
pub fn print_startup_failure(out: &mut impl Write, err: &GatewayError) -> io::Result<()> {
    writeln!(out, "{} {err}", style("Failed to start chatnsbot:").red().bold())?;
    Ok(())
}
