//! chatnsbot - terminal chat through the tool gateway.
//!
//! Run with: cargo run -p chatnsbot -- --port 8700
//!
//! Connects to the gateway, opens a session against the chat provider and
//! relays each line typed by the user to its `chat_completion` tool, sending
//! the whole conversation every turn.

mod chat;
mod cli;
mod logging;

use std::{
    io::{self, IsTerminal, Write},
    process::ExitCode,
    time::Duration,
};

use chatns_core::ToolGateway;
use chatns_gateway::GatewayClient;
use clap::Parser;
use tokio::io::BufReader;

use chat::{
    ChatBot, banner,
    input::{ChatInput, ReaderInput},
    loop_runner::Exit,
};
use cli::Cli;

/// Exit status when the gateway cannot be reached or refuses the session.
const EXIT_STARTUP_FAILURE: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        match run(&cli).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        }
    });

    // A pending stdin read parks a blocking thread; don't wait for it.
    runtime.shutdown_timeout(Duration::from_millis(100));
    code
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut stdout = io::stdout();

    if cli.list_servers {
        return list_servers(cli, &mut stdout).await;
    }

    let connect = GatewayClient::connect(&cli.host, cli.port, cli.timeout());
    let mut bot = match ChatBot::start(
        connect,
        &cli.provider,
        &cli.credentials(),
        cli.generation_params(),
    )
    .await
    {
        Ok(bot) => bot,
        Err(e) => {
            banner::print_startup_failure(&mut io::stderr(), &e)?;
            return Ok(ExitCode::from(EXIT_STARTUP_FAILURE));
        }
    };

    let addr = format!("{}:{}", cli.host, cli.port);
    banner::print_welcome(&mut stdout, bot.session(), &bot.params().model, &addr)?;

    let exit = converse(&mut bot, &mut stdout).await;
    if let Ok(reason) = &exit {
        tracing::debug!("Chat loop ended: {reason:?}");
    }

    // Teardown runs even if the loop hit an I/O error. A second Ctrl+C
    // abandons it.
    let session_id = bot.session().id.clone();
    tokio::select! {
        done = bot.shutdown(&mut stdout) => done?,
        () = interrupt() => {
            tracing::warn!("Teardown interrupted; session {session_id} left to the gateway");
        }
    }
    exit?;
    Ok(ExitCode::SUCCESS)
}

/// Run the chat loop with line editing when attached to a terminal.
async fn converse<G: ToolGateway>(
    bot: &mut ChatBot<G>,
    stdout: &mut io::Stdout,
) -> io::Result<Exit> {
    if console::user_attended() && io::stdin().is_terminal() {
        match ChatInput::new(banner::PROMPT.to_string()) {
            Ok((mut input, mut writer)) => {
                let exit = bot.run(&mut input, &mut writer).await;
                // Leave raw mode before teardown so Ctrl+C is a signal again.
                input.finish();
                return exit;
            }
            Err(e) => tracing::warn!("Line editing unavailable, reading plain input: {e}"),
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    bot.run(&mut ReaderInput::with_interrupt(stdin, interrupt()), stdout)
        .await
}

async fn list_servers(cli: &Cli, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let mut client = match GatewayClient::connect(&cli.host, cli.port, cli.timeout()).await {
        Ok(client) => client,
        Err(e) => {
            banner::print_startup_failure(&mut io::stderr(), &e)?;
            return Ok(ExitCode::from(EXIT_STARTUP_FAILURE));
        }
    };

    let listed = client.list_servers().await;
    client.disconnect().await;

    match listed {
        Ok(list) => {
            for server in &list.servers {
                writeln!(out, "{}", serde_json::to_string(server)?)?;
            }
            let count = list.count.unwrap_or(list.servers.len() as u64);
            writeln!(out, "{count} server(s)")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            banner::print_startup_failure(&mut io::stderr(), &e)?;
            Ok(ExitCode::from(EXIT_STARTUP_FAILURE))
        }
    }
}

/// Resolves on the next Ctrl+C.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
