//! Interactive operator session.

use common::{LockerId, Occupant};
use locker_store::LockerStore;
use remote::RemoteController;
use saga::{AssignmentOrchestrator, NotificationChannel, OccupyRequest, PasscodeGenerator, SagaError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::command::{Command, is_yes, parse_line};
use crate::render;

const PROMPT: &str = "> ";
const GREETING: &str = "Locker console. Type 'help' for commands.";

/// Reads commands line by line and runs them against one orchestrator.
pub struct Session<S, R, N, G>
where
    S: LockerStore,
    R: RemoteController,
    N: NotificationChannel,
    G: PasscodeGenerator,
{
    orchestrator: AssignmentOrchestrator<S, R, N, G>,
}

impl<S, R, N, G> Session<S, R, N, G>
where
    S: LockerStore,
    R: RemoteController,
    N: NotificationChannel,
    G: PasscodeGenerator,
{
    pub fn new(orchestrator: AssignmentOrchestrator<S, R, N, G>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &AssignmentOrchestrator<S, R, N, G> {
        &self.orchestrator
    }

    /// Runs until `quit` or end of input.
    ///
    /// State-changing commands are confirmed first; anything but `y` or
    /// `yes` cancels them before the saga starts.
    pub async fn run<I, O>(&self, input: I, mut output: O) -> std::io::Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        say(&mut output, GREETING).await?;

        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    output.write_all(e.render().to_string().as_bytes()).await?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }

            if let Some(question) = command.confirmation()
                && !confirm(&mut lines, &mut output, &question).await?
            {
                say(&mut output, "Cancelled.").await?;
                continue;
            }

            let reply = self.execute(command).await;
            say(&mut output, &reply).await?;
        }

        if let Err(e) = self.orchestrator.settle_snapshots().await {
            tracing::error!(error = %e, "leaving with an undiscarded snapshot");
            say(&mut output, render::snapshot_retained()).await?;
        }
        say(&mut output, "Bye.").await
    }

    /// Runs one command and describes the outcome.
    pub async fn execute(&self, command: Command) -> String {
        match command {
            Command::Status => render::status(&self.orchestrator.occupancy().await),
            Command::Show { locker } => {
                let locker_id = LockerId::new(locker);
                match self.orchestrator.store().get(&locker_id).await {
                    Ok(record) => render::record(&locker_id, record.as_ref()),
                    Err(e) => render::describe_error(&SagaError::Store(e)),
                }
            }
            Command::Occupy {
                locker,
                occupant,
                email,
                passcode,
                no_notify,
            } => {
                let mut occupant = Occupant::new(occupant);
                occupant.email = email;

                let mut request = OccupyRequest::new(locker, occupant);
                if let Some(code) = passcode {
                    request = request.with_passcode(code);
                }
                if no_notify {
                    request = request.with_notification(false);
                }

                match self.orchestrator.occupy(request).await {
                    Ok(report) => render::occupied(&report),
                    Err(e) => render::describe_error(&e),
                }
            }
            Command::Unlock { locker } => {
                match self.orchestrator.unlock(&LockerId::new(locker)).await {
                    Ok(report) => render::unlocked(&report),
                    Err(e) => render::describe_error(&e),
                }
            }
            Command::Sync => match self.orchestrator.sync_from_remote().await {
                Ok(report) => render::synced(&report),
                Err(e) => render::describe_error(&e),
            },
            Command::Push => match self.orchestrator.push_to_remote().await {
                Ok(report) => render::pushed(&report),
                Err(e) => render::describe_error(&e),
            },
            Command::Quit => String::new(),
        }
    }
}

async fn confirm<I, O>(lines: &mut Lines<I>, output: &mut O, question: &str) -> std::io::Result<bool>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    output
        .write_all(format!("{question} Proceed? [y/N] ").as_bytes())
        .await?;
    output.flush().await?;

    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(is_yes(&answer))
}

async fn say<O: AsyncWrite + Unpin>(output: &mut O, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
